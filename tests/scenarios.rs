//! End-to-end scenarios driving the HTTP surface against an in-memory
//! database, covering the full call lifecycle and the ledger invariant that
//! every balance equals the sum of its linked attendance modifiers.

use chrono::Utc;
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use dkp_ledger::api;

async fn setup_client() -> Client {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    let rocket = rocket::build().mount("/", api::routes()).manage(pool);
    Client::tracked(rocket).await.expect("valid rocket instance")
}

fn pool(client: &Client) -> &SqlitePool {
    client.rocket().state::<SqlitePool>().unwrap()
}

async fn seed_registered(client: &Client, account: &str, character: &str) -> i64 {
    let pool = pool(client);
    let account_id = sqlx::query("INSERT INTO accounts (name) VALUES (?1)")
        .bind(account)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();
    sqlx::query(
        "INSERT INTO characters (name, account_id, class, level, status, last_modified)
         VALUES (?1, ?2, 'Warlock', 60, 'main', ?3)",
    )
    .bind(character)
    .bind(account_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
    account_id
}

fn who_log(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("[Thu May 25 22:10:50 2023] [60 Warlock] {name} (Iksar) <Ex Astra>"))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn create_event(client: &Client) -> i64 {
    let response = client
        .post("/events")
        .header(ContentType::JSON)
        .body(json!({"name": "Tuesday raids", "created_by": "officer"}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.unwrap();
    body["id"].as_i64().unwrap()
}

async fn create_call(client: &Client, event_id: i64, raid_name: &str, modifier: i64, log: &str) -> Value {
    let response = client
        .post(format!("/events/{event_id}/calls"))
        .header(ContentType::JSON)
        .body(
            json!({
                "raid_name": raid_name,
                "modifier": modifier,
                "who_log": log,
                "created_by": "officer"
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    response.into_json().await.unwrap()
}

async fn earned(client: &Client, account_id: i64) -> i64 {
    let response = client
        .get(format!("/accounts/{account_id}/balance"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.unwrap();
    body["earned_dkp"].as_i64().unwrap()
}

#[tokio::test]
async fn raid_night_lifecycle() {
    let client = setup_client().await;
    let halfdan = seed_registered(&client, "halfdan", "Azrosaurus").await;
    let meera = seed_registered(&client, "meera", "Healbot").await;
    let tov = seed_registered(&client, "tov", "Tanky").await;

    let event_id = create_event(&client).await;

    // Three registered, one unknown: three credits, one reject.
    let outcome = create_call(
        &client,
        event_id,
        "VP",
        2,
        &who_log(&["Azrosaurus", "Healbot", "Tanky", "Stranger"]),
    )
    .await;
    assert_eq!(outcome["recorded"].as_array().unwrap().len(), 3);
    assert_eq!(outcome["rejected"].as_array().unwrap().len(), 1);
    assert_eq!(outcome["rejected"][0]["reason"], "Not registered");
    for account_id in [halfdan, meera, tov] {
        assert_eq!(earned(&client, account_id).await, 2);
    }

    // Raise the modifier and lower it back: balances return to 2.
    let call_id = outcome["call"]["id"].as_i64().unwrap();
    for modifier in [5, 2] {
        let response = client
            .patch(format!("/events/{event_id}/calls/{call_id}"))
            .header(ContentType::JSON)
            .body(json!({ "modifier": modifier }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }
    assert_eq!(earned(&client, halfdan).await, 2);

    // Close the event: further calls are rejected, the ledger untouched.
    let response = client
        .post(format!("/events/{event_id}/close"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let response = client
        .post(format!("/events/{event_id}/calls"))
        .header(ContentType::JSON)
        .body(
            json!({"raid_name": "KT", "modifier": 1, "who_log": "", "created_by": "officer"})
                .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);
    assert_eq!(earned(&client, halfdan).await, 2);

    // Reopen and delete the call: every balance returns to zero.
    let response = client
        .post(format!("/events/{event_id}/reopen"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let response = client
        .delete(format!("/events/{event_id}/calls/{call_id}"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    for account_id in [halfdan, meera, tov] {
        assert_eq!(earned(&client, account_id).await, 0);
    }

    let response = client.get(format!("/events/{event_id}")).dispatch().await;
    let body: Value = response.into_json().await.unwrap();
    assert!(body["calls"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn two_characters_one_account_earn_once() {
    let client = setup_client().await;
    let account_id = seed_registered(&client, "halfdan", "Azrosaurus").await;
    sqlx::query(
        "INSERT INTO characters (name, account_id, class, level, status, last_modified)
         VALUES ('Boxalt', ?1, 'Cleric', 58, 'alt', ?2)",
    )
    .bind(account_id)
    .bind(Utc::now())
    .execute(pool(&client))
    .await
    .unwrap();

    let event_id = create_event(&client).await;
    let outcome = create_call(
        &client,
        event_id,
        "VP",
        3,
        &who_log(&["Azrosaurus", "Boxalt"]),
    )
    .await;

    assert_eq!(outcome["recorded"].as_array().unwrap().len(), 1);
    assert_eq!(outcome["recorded"][0]["character_name"], "Azrosaurus");
    assert!(outcome["rejected"].as_array().unwrap().is_empty());
    assert_eq!(earned(&client, account_id).await, 3);
}

#[tokio::test]
async fn manual_add_and_remove_round_trip() {
    let client = setup_client().await;
    let account_id = seed_registered(&client, "halfdan", "Azrosaurus").await;
    let event_id = create_event(&client).await;
    let outcome = create_call(&client, event_id, "VP", 4, "").await;
    let call_id = outcome["call"]["id"].as_i64().unwrap();

    let response = client
        .post(format!("/events/{event_id}/calls/{call_id}/attendees"))
        .header(ContentType::JSON)
        .body(json!({"character_name": "Azrosaurus"}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["account_id"].as_i64().unwrap(), account_id);
    assert_eq!(earned(&client, account_id).await, 4);

    let response = client
        .delete(format!(
            "/events/{event_id}/calls/{call_id}/attendees/Azrosaurus"
        ))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(earned(&client, account_id).await, 0);

    let response = client
        .delete(format!(
            "/events/{event_id}/calls/{call_id}/attendees/Azrosaurus"
        ))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
}

#[tokio::test]
async fn reorder_rejects_foreign_ids_and_keeps_order() {
    let client = setup_client().await;
    let event_id = create_event(&client).await;
    let first = create_call(&client, event_id, "VP", 1, "").await;
    let second = create_call(&client, event_id, "KT", 1, "").await;
    let first_id = first["call"]["id"].as_i64().unwrap();
    let second_id = second["call"]["id"].as_i64().unwrap();

    let response = client
        .put(format!("/events/{event_id}/calls/order"))
        .header(ContentType::JSON)
        .body(json!({"call_ids": [first_id, 9999]}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = client.get(format!("/events/{event_id}")).dispatch().await;
    let body: Value = response.into_json().await.unwrap();
    let ordered: Vec<i64> = body["calls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|call| call["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ordered, vec![first_id, second_id]);
}
