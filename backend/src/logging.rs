use tracing::{Event, Subscriber};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "warn,mealwheel_backend=info,shared=info,tower_http=info";

/// Debug lines are only echoed for the stateful parts: stores, the spin and
/// compression flows, and the wheel logic in `shared`.
const DEBUG_TARGETS: &[&str] = &[
    "mealwheel_backend::store",
    "mealwheel_backend::services",
    "mealwheel_backend::imaging",
    "shared::shared_wheel",
];

fn shows_debug(target: &str) -> bool {
    DEBUG_TARGETS.iter().any(|prefix| target.starts_with(prefix))
}

#[derive(Default)]
struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        }
    }
}

struct CustomLayer;

impl<S: Subscriber> Layer<S> for CustomLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if visitor.0.is_empty() {
            return;
        }

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        match *metadata.level() {
            tracing::Level::ERROR => println!("[{}] ❌ Error: {} - {}", timestamp, metadata.target(), visitor.0),
            tracing::Level::WARN => println!("[{}] ⚠️ Warning: {} - {}", timestamp, metadata.target(), visitor.0),
            tracing::Level::INFO => println!("[{}] ℹ️ {} - {}", timestamp, metadata.target(), visitor.0),
            tracing::Level::DEBUG => {
                if shows_debug(metadata.target()) {
                    println!("[{}] 🔄 {} - {}", timestamp, metadata.target(), visitor.0);
                }
            }
            _ => {}
        }
    }
}

pub fn setup() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = Registry::default().with(env_filter).with(CustomLayer);

    // try_init also forwards `log` records from the shared crate
    if let Err(e) = subscriber.try_init() {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}
