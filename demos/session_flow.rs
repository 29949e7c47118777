//! Session Flow Example - Drives one session through its whole lifecycle.
//!
//! This example shows:
//! - Starting a session and printing its pairing QR
//! - Connecting and receiving a message
//! - Inspecting the webhook envelopes that would be relayed
//! - Disconnecting and the session being forgotten
//!
//! Run with: `cargo run --example session_flow`

use std::sync::Arc;
use std::time::Duration;

use whatsapp_bridge::protocol::qr;
use whatsapp_bridge::types::{Contact, RawMessage};
use whatsapp_bridge::{
    MemoryClientFactory, MemorySink, NormalizedEvent, SessionManager, WebhookEnvelope,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== whatsapp-bridge Session Flow Demo ===\n");

    let factory = Arc::new(MemoryClientFactory::new());
    let sink = Arc::new(MemorySink::new());
    let manager = SessionManager::new(factory.clone(), sink.clone());
    let timeout = Duration::from_secs(2);

    println!("Step 1: Starting session demo...");
    manager.start("demo")?;
    let client = factory.client("demo").ok_or("client was not created")?;
    println!("   Status: {:?}\n", manager.status("demo")?);

    println!("Step 2: Pairing QR issued");
    let payload = "2@demo-ref,demo-key";
    client.qr(payload);
    sink.wait_for(timeout, |e| matches!(e, NormalizedEvent::QrIssued { .. }))
        .await
        .ok_or("no QR relayed")?;
    println!("{}", qr::render_ascii(payload)?);
    println!("   PNG size: {} bytes\n", manager.qr_code("demo")?.len());

    println!("Step 3: Phone scanned the code");
    client.ready();
    sink.wait_for(timeout, |e| matches!(e, NormalizedEvent::Connected { .. }))
        .await
        .ok_or("no connection relayed")?;
    println!("   Status: {:?}\n", manager.status("demo")?);

    println!("Step 4: Incoming message");
    client.add_contact(Contact {
        id: "15550001@c.us".into(),
        pushname: Some("Bob".into()),
        number: "+15550001".into(),
        ..Default::default()
    });
    client.receive(RawMessage {
        id: "MSG1".into(),
        from: "15550001@c.us".into(),
        body: "hello bridge".into(),
        timestamp: chrono::Utc::now().timestamp(),
        ..Default::default()
    });
    let event = sink
        .wait_for(timeout, |e| matches!(e, NormalizedEvent::MessageReceived { .. }))
        .await
        .ok_or("no message relayed")?;
    let envelope = WebhookEnvelope::from(&event);
    println!("   Envelope: {}\n", serde_json::to_string_pretty(&envelope)?);

    println!("Step 5: Disconnect");
    client.disconnect("LOGOUT");
    sink.wait_for(timeout, |e| matches!(e, NormalizedEvent::Disconnected { .. }))
        .await
        .ok_or("no disconnect relayed")?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    match manager.status("demo") {
        Ok(status) => println!("   Still tracked: {:?}", status),
        Err(e) => println!("   Session forgotten: {}", e),
    }

    println!("\n   Relayed {} events in total", sink.events().len());
    println!("\n=== Demo Complete ===");
    Ok(())
}
