// src/main.rs
//
// Smoke test against a running workforce backend:
//   WORKFORCE_URL=http://localhost:3000 WORKFORCE_NIK=... WORKFORCE_PASSWORD=... cargo run

use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::error::Error;

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct EmployeeProfile {
    id: u64,
    nik: String,
    name: String,
    on_leave: bool,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    expires_at: String,
    user: EmployeeProfile,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = env::var("WORKFORCE_URL").unwrap_or_else(|_| "http://localhost:3000".into());
    let nik = env::var("WORKFORCE_NIK")?;
    let password = env::var("WORKFORCE_PASSWORD")?;
    let client = Client::new();

    println!("\n🔍 Testing health check endpoint...");
    let health = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health check response: {:?}", health);
    if health.status != "ok" {
        return Err(format!("unexpected health status {}", health.status).into());
    }

    println!("\n🔍 Logging in as employee {}...", nik);
    let login_response = client
        .post(format!("{}/api/auth/employee/login", base_url))
        .json(&json!({ "nik": nik, "password": password }))
        .send()
        .await?;
    if !login_response.status().is_success() {
        let status = login_response.status();
        println!("Login failed: {} {}", status, login_response.text().await?);
        return Err(format!("login returned {}", status).into());
    }
    let login = login_response.json::<LoginResponse>().await?;
    println!(
        "Logged in as {} ({}, id {}), session valid until {}",
        login.user.name, login.user.nik, login.user.id, login.expires_at
    );
    let bearer = format!("Bearer {}", login.token);

    if login.user.on_leave {
        println!("\n⏭️  Employee is on leave (cuti), skipping check-in");
    } else {
        println!("\n🔍 Checking in...");
        let check_in = client
            .post(format!("{}/api/me/attendance/check-in", base_url))
            .header(header::AUTHORIZATION, &bearer)
            .send()
            .await?;
        let status = check_in.status();
        let body = check_in.json::<Value>().await?;
        println!("Check-in status: {}", status);
        println!("Check-in body: {}", serde_json::to_string_pretty(&body)?);
    }

    println!("\n🔍 Fetching notifications...");
    let notifications = client
        .get(format!("{}/api/me/notifications?unread_only=true", base_url))
        .header(header::AUTHORIZATION, &bearer)
        .send()
        .await?
        .json::<Vec<Value>>()
        .await?;
    println!("{} unread notification(s)", notifications.len());

    println!("\n🔍 Logging out...");
    let logout = client
        .post(format!("{}/api/auth/logout", base_url))
        .header(header::AUTHORIZATION, &bearer)
        .send()
        .await?;
    println!("Logout status: {}", logout.status());

    println!("\n✅ Smoke test finished");
    Ok(())
}
