use chrono::{DateTime, Local, NaiveDateTime, Utc};
use hostmon_common::types::{SensorId, TIMESTAMP_FORMAT};

/// Subject and body of one breach notification.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    /// Renders the notification for `sensor` reading `value` against
    /// `threshold`. `captured_at` is the sample's local capture time and
    /// `raised_at` the moment the engine decided to alert.
    pub fn render(
        sensor: &SensorId,
        value: f64,
        threshold: f64,
        captured_at: NaiveDateTime,
        raised_at: DateTime<Utc>,
    ) -> Self {
        let (title, impact) = describe(sensor);
        let subject = format!("ALERT - {title} critical: {value:.1}%");
        let body = format!(
            "Critical system alert detected!\n\
             \n\
             Sensor: {sensor}\n\
             {title} has reached a critical level: {value:.1}% (threshold: {threshold:.1}%)\n\
             \n\
             {impact}\n\
             \n\
             Sample captured at: {captured}\n\
             Alert raised at: {raised}\n",
            captured = captured_at.format(TIMESTAMP_FORMAT),
            raised = raised_at.with_timezone(&Local).format(TIMESTAMP_FORMAT),
        );
        Self { subject, body }
    }
}

fn describe(sensor: &SensorId) -> (String, &'static str) {
    match sensor {
        SensorId::Cpu => (
            "CPU usage".to_string(),
            "Sustained CPU saturation can slow services down or interrupt them. \
             Intervention may be required.",
        ),
        SensorId::Ram => (
            "RAM usage".to_string(),
            "High memory usage can crash the system or degrade performance. \
             Check the processes consuming the most memory.",
        ),
        SensorId::Disk => (
            "Disk usage".to_string(),
            "Insufficient disk space can stop services from working and prevent \
             new files from being created. Free some space quickly.",
        ),
        SensorId::Custom(name) => (
            format!("Sensor '{name}'"),
            "The reading is above its configured threshold.",
        ),
    }
}
