//! Embeds delivered to weather subscribers.

use chrono::DateTime;
use serde::Serialize;
use utoipa::ToSchema;

use super::client::{AlertFeature, ForecastPeriod};
use crate::platform::Embed;

const RED: u32 = 0xff4545;
const COLD_BLUE: u32 = 0x1e90ff;
const HEAT_ORANGE: u32 = 0xff4500;
const NEUTRAL: u32 = 0xfffffe;

/// Discord timestamp markup for an RFC 3339 instant.
fn discord_time(raw: Option<&str>) -> Option<String> {
    let parsed = DateTime::parse_from_rfc3339(raw?).ok()?;
    Some(format!("<t:{}:F>", parsed.timestamp()))
}

fn article(word: &str) -> &'static str {
    match word.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "An",
        _ => "A",
    }
}

pub fn severe_alert(alert: &AlertFeature) -> Embed {
    let props = &alert.properties;
    let issued = discord_time(props.sent.as_deref());
    let expires = discord_time(props.expires.as_deref());

    let description = match (issued, expires) {
        (Some(issued), Some(expires)) => format!(
            "{} **{}** was issued at **{issued}** for your location and is in effect until **{expires}**.",
            article(&props.event),
            props.event
        ),
        _ => format!(
            "{} **{}** was issued for your location.",
            article(&props.event),
            props.event
        ),
    };

    let mut embed = Embed::new(props.event.clone())
        .description(description)
        .color(RED);
    if let Some(instruction) = &props.instruction {
        embed = embed.field("Instruction", instruction.replace('\n', " ").trim(), false);
    }
    for (name, value) in [
        ("Severity", &props.severity),
        ("Urgency", &props.urgency),
        ("Certainty", &props.certainty),
    ] {
        if let Some(value) = value {
            embed = embed.field(name, value.as_str(), true);
        }
    }
    if let Some(sender) = &props.sender_name {
        embed = embed.footer(format!("Issued by {sender}"));
    }
    embed
}

/// Sent when a user turns on severe alerts, to prove delivery works.
pub fn example_severe_alert() -> Embed {
    Embed::new("Example Severe Thunderstorm Warning")
        .description("This is an example of a Severe Thunderstorm Warning to show you how alerts will look. Future alerts will not be examples, and you should listen to their guidance and instruction.")
        .color(RED)
        .field("Description", "Severe thunderstorms are occurring in your area.", false)
        .field("Instruction", "Take shelter immediately.", false)
        .field("Severity", "Severe", true)
        .field("Urgency", "Immediate", true)
        .field("Certainty", "Observed", true)
}

fn temperature_label(period: &ForecastPeriod) -> String {
    match period.temperature {
        Some(temperature) => format!("{temperature}°F"),
        None => "N/A".to_string(),
    }
}

pub fn freeze_alert(period: &ForecastPeriod) -> Embed {
    Embed::new("Extreme cold alert")
        .description(format!(
            "Expected dangerously cold temperatures: {}",
            temperature_label(period)
        ))
        .color(COLD_BLUE)
        .field("Time", period.name.as_str(), true)
        .field("Detailed Forecast", period.detailed_forecast.as_str(), false)
        .footer("Stay warm and take necessary precautions.")
}

pub fn heat_alert(period: &ForecastPeriod) -> Embed {
    Embed::new("Extreme heat alert")
        .description(format!(
            "Expected dangerously hot temperatures: {}",
            temperature_label(period)
        ))
        .color(HEAT_ORANGE)
        .field("Time", period.name.as_str(), true)
        .field("Detailed Forecast", period.detailed_forecast.as_str(), false)
        .footer("Stay cool and take necessary precautions.")
}

/// One page per forecast period.
pub fn forecast_pages(periods: &[ForecastPeriod]) -> Vec<Embed> {
    periods
        .iter()
        .map(|period| {
            Embed::new(format!("Weather forecast for {}", period.name))
                .description(period.detailed_forecast.as_str())
                .color(NEUTRAL)
                .field("Temperature", temperature_label(period), true)
        })
        .collect()
}

const HTML_TO_MARKDOWN: [(&str, &str); 38] = [
    ("<b>", "**"),
    ("</b>", "**"),
    ("<i>", "*"),
    ("</i>", "*"),
    ("<strong>", "**"),
    ("</strong>", "**"),
    ("<em>", "*"),
    ("</em>", "*"),
    ("<br>", "\n"),
    ("<br/>", "\n"),
    ("<br />", "\n"),
    ("<p>", "\n"),
    ("</p>", "\n"),
    ("<ul>", "\n"),
    ("</ul>", "\n"),
    ("<li>", "- "),
    ("</li>", "\n"),
    ("<h1>", "# "),
    ("</h1>", "\n"),
    ("<h2>", "## "),
    ("</h2>", "\n"),
    ("<h3>", "### "),
    ("</h3>", "\n"),
    ("<h4>", "#### "),
    ("</h4>", "\n"),
    ("<h5>", "##### "),
    ("</h5>", "\n"),
    ("<h6>", "###### "),
    ("</h6>", "\n"),
    ("<B>", "**"),
    ("</B>", "**"),
    ("<I>", "*"),
    ("</I>", "*"),
    ("<BR>", "\n"),
    ("<P>", "\n"),
    ("</P>", "\n"),
    ("<LI>", "- "),
    ("</LI>", "\n"),
];

/// Rewrites the simple HTML used in glossary definitions as Markdown.
/// Unknown tags pass through untouched.
pub fn html_to_markdown(html: &str) -> String {
    HTML_TO_MARKDOWN
        .iter()
        .fold(html.to_string(), |text, (tag, markdown)| text.replace(tag, markdown))
}

/// One glossary entry as a page. An empty definition gets a placeholder.
pub fn glossary_page(term: &str, definition: &str) -> Embed {
    let description = if definition.trim().is_empty() {
        "No description available.".to_string()
    } else {
        html_to_markdown(definition)
    };
    Embed::new(term).description(description).color(NEUTRAL)
}

/// Eight-point compass name for a bearing in degrees.
pub fn compass_direction(degrees: f64) -> &'static str {
    const POINTS: [&str; 8] = [
        "North",
        "Northeast",
        "East",
        "Southeast",
        "South",
        "Southwest",
        "West",
        "Northwest",
    ];
    let normalized = degrees.rem_euclid(360.0);
    let sector = ((normalized - 22.5) / 45.0).ceil().max(0.0) as usize % 8;
    POINTS[sector]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum LightningCategory {
    None,
    Low,
    Medium,
    High,
    Extreme,
}

impl LightningCategory {
    /// Buckets the Open-Meteo lightning potential index (J/kg).
    pub fn from_potential(potential: Option<f64>) -> Self {
        match potential {
            None => Self::None,
            Some(value) if value == 0.0 => Self::None,
            Some(value) if value < 500.0 => Self::Low,
            Some(value) if value < 1000.0 => Self::Medium,
            Some(value) if value < 2000.0 => Self::High,
            Some(_) => Self::Extreme,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::client::AlertProperties;

    fn alert(event: &str) -> AlertFeature {
        AlertFeature {
            id: "NWS-1".to_string(),
            properties: AlertProperties {
                event: event.to_string(),
                instruction: Some("Move to\nhigher ground.".to_string()),
                severity: Some("Severe".to_string()),
                sent: Some("2026-05-01T12:00:00-05:00".to_string()),
                expires: Some("2026-05-01T18:00:00-05:00".to_string()),
                sender_name: Some("NWS Tulsa OK".to_string()),
                ..AlertProperties::default()
            },
        }
    }

    #[test]
    fn test_severe_alert_embed() {
        let embed = severe_alert(&alert("Flood Warning"));
        assert_eq!(embed.title.as_deref(), Some("Flood Warning"));
        assert_eq!(embed.field_value("Instruction"), Some("Move to higher ground."));
        assert_eq!(embed.field_value("Severity"), Some("Severe"));
        assert_eq!(embed.field_value("Urgency"), None);
        let description = embed.description.unwrap();
        assert!(description.starts_with("A **Flood Warning** was issued at **<t:1777654800:F>**"));
        assert_eq!(embed.footer.unwrap().text, "Issued by NWS Tulsa OK");
    }

    #[test]
    fn test_article_for_vowel_events() {
        let embed = severe_alert(&alert("Extreme Wind Warning"));
        assert!(embed.description.unwrap().starts_with("An **Extreme Wind Warning**"));
    }

    #[test]
    fn test_glossary_definition_html_becomes_markdown() {
        let page = glossary_page(
            "Derecho",
            "<p>A <b>widespread</b>, long-lived <i>wind</i> storm.<br />See also: <em>bow echo</em></p>",
        );
        assert_eq!(page.title.as_deref(), Some("Derecho"));
        assert_eq!(
            page.description.as_deref(),
            Some("\nA **widespread**, long-lived *wind* storm.\nSee also: *bow echo*\n")
        );
    }

    #[test]
    fn test_empty_glossary_definition_gets_placeholder() {
        let page = glossary_page("Haboob", "  ");
        assert_eq!(page.description.as_deref(), Some("No description available."));
    }

    #[test]
    fn test_compass_direction_boundaries() {
        assert_eq!(compass_direction(0.0), "North");
        assert_eq!(compass_direction(22.5), "North");
        assert_eq!(compass_direction(23.0), "Northeast");
        assert_eq!(compass_direction(180.0), "South");
        assert_eq!(compass_direction(300.0), "Northwest");
        assert_eq!(compass_direction(350.0), "North");
        assert_eq!(compass_direction(360.0), "North");
    }

    #[test]
    fn test_lightning_categories() {
        assert_eq!(LightningCategory::from_potential(None), LightningCategory::None);
        assert_eq!(LightningCategory::from_potential(Some(0.0)), LightningCategory::None);
        assert_eq!(LightningCategory::from_potential(Some(499.0)), LightningCategory::Low);
        assert_eq!(LightningCategory::from_potential(Some(500.0)), LightningCategory::Medium);
        assert_eq!(LightningCategory::from_potential(Some(1999.0)), LightningCategory::High);
        assert_eq!(LightningCategory::from_potential(Some(2000.0)), LightningCategory::Extreme);
    }
}
