//! Integration tests for the severe, freeze and heat alert monitors.

use std::sync::Arc;

use guildkeeper::config::WeatherConfig;
use guildkeeper::monitor::Check;
use guildkeeper::weather::{AlertKind, ForecastAlertMonitor, SevereAlertMonitor};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{CHICAGO_POINT, CHICAGO_ZIP, FakePlatform, NYC_POINT, NYC_ZIP};

fn alert(id: &str, event: &str, severity: &str) -> Value {
    json!({
        "id": id,
        "properties": {
            "event": event,
            "severity": severity,
            "urgency": "Immediate",
            "certainty": "Observed",
            "senderName": "NWS New York NY"
        }
    })
}

async fn mount_alerts(server: &MockServer, point: &str, features: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/alerts/active"))
        .and(query_param("point", point))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "features": features })))
        .mount(server)
        .await;
}

async fn mount_forecast(server: &MockServer, point: &str, periods: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/points/{point}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {"forecast": format!("{}/gridpoints/OKX/33,35/forecast", server.uri())}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gridpoints/OKX/33,35/forecast"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "properties": { "periods": periods } })),
        )
        .mount(server)
        .await;
}

fn period(name: &str, start: &str, temperature: i64) -> Value {
    json!({
        "name": name,
        "startTime": start,
        "temperature": temperature,
        "temperatureUnit": "F",
        "detailedForecast": format!("{name}: {temperature} degrees.")
    })
}

fn severe_monitor(context: guildkeeper::weather::alerts::AlertContext) -> SevereAlertMonitor {
    SevereAlertMonitor::new(context, Duration::from_secs(900))
}

#[tokio::test]
async fn test_severe_alert_is_delivered_once() {
    let server = MockServer::start().await;
    let platform = FakePlatform::new();
    let context = test_utils::setup_alert_context(Arc::clone(&platform), &server)
        .await
        .unwrap();
    test_utils::subscribe(&context, 7, NYC_ZIP, AlertKind::Severe)
        .await
        .unwrap();
    mount_alerts(
        &server,
        NYC_POINT,
        vec![alert("NWS-123", "Tornado Warning", "Extreme")],
    )
    .await;

    let monitor = severe_monitor(context.clone());
    let first = monitor.tick().await.unwrap();
    let second = monitor.tick().await.unwrap();

    assert_eq!(first.acted, 1);
    assert_eq!(second.acted, 0);
    assert_eq!(platform.titles_for(7), vec!["Tornado Warning"]);
    assert!(
        context
            .profiles
            .delivered(7, AlertKind::Severe)
            .await
            .unwrap()
            .contains("NWS-123")
    );
    assert_eq!(context.stats.counters().await.unwrap().total_alerts_sent, 1);
}

#[tokio::test]
async fn test_only_new_alerts_are_delivered_on_later_ticks() {
    let server = MockServer::start().await;
    let platform = FakePlatform::new();
    let context = test_utils::setup_alert_context(Arc::clone(&platform), &server)
        .await
        .unwrap();
    test_utils::subscribe(&context, 7, NYC_ZIP, AlertKind::Severe)
        .await
        .unwrap();
    let monitor = severe_monitor(context.clone());

    mount_alerts(
        &server,
        NYC_POINT,
        vec![
            alert("A", "Flash Flood Warning", "Severe"),
            alert("B", "Tornado Warning", "Extreme"),
        ],
    )
    .await;
    monitor.tick().await.unwrap();
    assert_eq!(
        platform.titles_for(7),
        vec!["Flash Flood Warning", "Tornado Warning"]
    );

    server.reset().await;
    mount_alerts(
        &server,
        NYC_POINT,
        vec![
            alert("A", "Flash Flood Warning", "Severe"),
            alert("B", "Tornado Warning", "Extreme"),
            alert("C", "Blizzard Warning", "Severe"),
        ],
    )
    .await;
    let report = monitor.tick().await.unwrap();

    assert_eq!(report.acted, 1);
    assert_eq!(
        platform.titles_for(7),
        vec!["Flash Flood Warning", "Tornado Warning", "Blizzard Warning"]
    );
}

#[tokio::test]
async fn test_moderate_alerts_are_ignored() {
    let server = MockServer::start().await;
    let platform = FakePlatform::new();
    let context = test_utils::setup_alert_context(Arc::clone(&platform), &server)
        .await
        .unwrap();
    test_utils::subscribe(&context, 7, NYC_ZIP, AlertKind::Severe)
        .await
        .unwrap();
    mount_alerts(
        &server,
        NYC_POINT,
        vec![alert("NWS-1", "Wind Advisory", "Moderate")],
    )
    .await;

    let report = severe_monitor(context).tick().await.unwrap();

    assert_eq!(report.acted, 0);
    assert!(platform.direct_messages().is_empty());
}

#[tokio::test]
async fn test_failed_fetch_for_one_subscriber_does_not_affect_others() {
    let server = MockServer::start().await;
    let platform = FakePlatform::new();
    let context = test_utils::setup_alert_context(Arc::clone(&platform), &server)
        .await
        .unwrap();
    test_utils::subscribe(&context, 1, CHICAGO_ZIP, AlertKind::Severe)
        .await
        .unwrap();
    test_utils::subscribe(&context, 2, NYC_ZIP, AlertKind::Severe)
        .await
        .unwrap();
    test_utils::subscribe(&context, 3, NYC_ZIP, AlertKind::Severe)
        .await
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/alerts/active"))
        .and(query_param("point", CHICAGO_POINT))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_alerts(
        &server,
        NYC_POINT,
        vec![alert("NWS-9", "Tornado Warning", "Extreme")],
    )
    .await;

    let report = severe_monitor(context).tick().await.unwrap();

    assert_eq!(report.evaluated, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.acted, 2);
    assert!(platform.titles_for(1).is_empty());
    assert_eq!(platform.titles_for(2), vec!["Tornado Warning"]);
    assert_eq!(platform.titles_for(3), vec!["Tornado Warning"]);
}

#[tokio::test]
async fn test_unknown_zip_code_is_skipped_silently() {
    let server = MockServer::start().await;
    let platform = FakePlatform::new();
    let context = test_utils::setup_alert_context(Arc::clone(&platform), &server)
        .await
        .unwrap();
    context
        .profiles
        .set_alert(4, AlertKind::Severe, true)
        .await
        .unwrap();

    let report = severe_monitor(context).tick().await.unwrap();

    assert_eq!(report.evaluated, 1);
    assert_eq!(report.skipped, 1);
    assert!(platform.direct_messages().is_empty());
}

#[tokio::test]
async fn test_unreachable_subscriber_is_retried_next_tick() {
    let server = MockServer::start().await;
    let platform = FakePlatform::new();
    let context = test_utils::setup_alert_context(Arc::clone(&platform), &server)
        .await
        .unwrap();
    test_utils::subscribe(&context, 7, NYC_ZIP, AlertKind::Severe)
        .await
        .unwrap();
    platform.make_unreachable(7);
    mount_alerts(
        &server,
        NYC_POINT,
        vec![alert("NWS-5", "Tornado Warning", "Extreme")],
    )
    .await;

    let report = severe_monitor(context.clone()).tick().await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(
        context
            .profiles
            .delivered(7, AlertKind::Severe)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_freeze_alert_triggers_at_or_below_threshold() {
    let server = MockServer::start().await;
    let platform = FakePlatform::new();
    let context = test_utils::setup_alert_context(Arc::clone(&platform), &server)
        .await
        .unwrap();
    test_utils::subscribe(&context, 7, NYC_ZIP, AlertKind::Freeze)
        .await
        .unwrap();
    mount_forecast(
        &server,
        NYC_POINT,
        json!([
            period("Tonight", "2026-01-10T18:00:00-05:00", 10),
            period("Sunday", "2026-01-11T06:00:00-05:00", 11)
        ]),
    )
    .await;

    let monitor = ForecastAlertMonitor::freeze(context.clone(), &WeatherConfig::default());
    let report = monitor.tick().await.unwrap();

    assert_eq!(report.acted, 1);
    let messages = platform.direct_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].1.title.as_deref(), Some("Extreme cold alert"));
    assert_eq!(messages[0].1.field_value("Time"), Some("Tonight"));
    assert_eq!(
        context.stats.counters().await.unwrap().total_freeze_alerts_sent,
        1
    );
}

#[tokio::test]
async fn test_heat_alert_triggers_at_or_above_threshold() {
    let server = MockServer::start().await;
    let platform = FakePlatform::new();
    let context = test_utils::setup_alert_context(Arc::clone(&platform), &server)
        .await
        .unwrap();
    test_utils::subscribe(&context, 7, NYC_ZIP, AlertKind::Heat)
        .await
        .unwrap();
    mount_forecast(
        &server,
        NYC_POINT,
        json!([
            period("This Afternoon", "2026-07-10T12:00:00-04:00", 99),
            period("Saturday", "2026-07-11T06:00:00-04:00", 100)
        ]),
    )
    .await;

    let monitor = ForecastAlertMonitor::heat(context, &WeatherConfig::default());
    let report = monitor.tick().await.unwrap();

    assert_eq!(report.acted, 1);
    let messages = platform.direct_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].1.title.as_deref(), Some("Extreme heat alert"));
    assert_eq!(messages[0].1.field_value("Time"), Some("Saturday"));
}

#[tokio::test]
async fn test_forecast_alerts_repeat_unless_dedupe_is_enabled() {
    let server = MockServer::start().await;
    mount_forecast(
        &server,
        NYC_POINT,
        json!([period("Tonight", "2026-01-10T18:00:00-05:00", -3)]),
    )
    .await;

    let repeating = FakePlatform::new();
    let context = test_utils::setup_alert_context(Arc::clone(&repeating), &server)
        .await
        .unwrap();
    test_utils::subscribe(&context, 7, NYC_ZIP, AlertKind::Freeze)
        .await
        .unwrap();
    let monitor = ForecastAlertMonitor::freeze(context, &WeatherConfig::default());
    monitor.tick().await.unwrap();
    monitor.tick().await.unwrap();
    assert_eq!(repeating.direct_messages().len(), 2);

    let deduped = FakePlatform::new();
    let context = test_utils::setup_alert_context(Arc::clone(&deduped), &server)
        .await
        .unwrap();
    test_utils::subscribe(&context, 7, NYC_ZIP, AlertKind::Freeze)
        .await
        .unwrap();
    let config = WeatherConfig {
        forecast_alert_dedupe: true,
        ..WeatherConfig::default()
    };
    let monitor = ForecastAlertMonitor::freeze(context, &config);
    monitor.tick().await.unwrap();
    monitor.tick().await.unwrap();
    assert_eq!(deduped.direct_messages().len(), 1);
}
