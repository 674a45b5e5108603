//! Structured logging integration tests.
//!
//! Verifies the events emitted while a tracker runs: lifecycle at info,
//! contained faults at error, corrupt records at warn.
//!
//!   cargo test -p gtrack --test tracing_tests

#![cfg(test)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gtrack::prelude::*;
use gtrack::runtime::{MemoryStorage, PersistenceAdapter, StorageBackend};
use gtrack::{Scheduler, widgets::form::AUTOSAVE_ATTR};
use tracing_subscriber::layer::SubscriberExt;

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    message: String,
    fields: Vec<(String, String)>,
}

impl CapturedEvent {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A tracing Layer that records every event.
struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .push((field.name().to_string(), format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

fn with_captured_events<F: FnOnce()>(f: F) -> Vec<CapturedEvent> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let layer = EventCapture {
        events: Arc::clone(&events),
    };
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, f);
    let captured = events.lock().unwrap().clone();
    captured
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn contained_fault_logs_at_error() {
    let events = with_captured_events(|| {
        let mut tracker = GraduateTracker::new(Page::new(), TrackerConfig::default());
        tracker.init();
        tracker
            .scheduler()
            .schedule(Duration::from_millis(1), || panic!("lost handler"));
        tracker.advance(Duration::from_millis(1));
    });

    let fault = events
        .iter()
        .find(|e| e.level == tracing::Level::ERROR)
        .expect("error event");
    assert_eq!(fault.message, "caught unhandled fault");
    assert_eq!(fault.field("context"), Some("timer"));
    assert_eq!(fault.field("reason"), Some("lost handler"));
    assert!(events.iter().any(|e| e.message == "graduate tracker initialised"));
}

#[test]
fn corrupt_record_logs_at_warn_and_restores_nothing() {
    let backend = Arc::new(MemoryStorage::new());
    backend.set_item("form_profile", "{not json").unwrap();
    let persistence = PersistenceAdapter::with_backend(backend);

    let events = with_captured_events(|| {
        let mut page = Page::new();
        let root = page.root();
        let form = page.append(root, Element::new("form").with_attr(AUTOSAVE_ATTR, "profile"));
        page.append(form, Element::input(InputKind::Text, "full_name"));
        let mut tracker = GraduateTracker::with_services(
            Scheduler::new(),
            page.into_shared(),
            persistence.clone(),
            TrackerConfig::default(),
        );
        tracker.enable(Feature::Forms);
        assert_eq!(tracker.components().forms()[0].restored_fields(), 0);
    });

    assert!(events.iter().any(|e| e.level == tracing::Level::WARN));
    assert!(events.iter().all(|e| e.level != tracing::Level::ERROR));
    assert_eq!(persistence.stats().corrupt_loads, 1);
}
