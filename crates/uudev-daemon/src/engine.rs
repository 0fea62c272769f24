//! Engine loop: udev events → rule matching → dispatch
//!
//! The engine owns the compiled rule set and drives the main processing
//! loop. Each event is evaluated against every rule in load order before the
//! next event is taken; matched rules are handed to the dispatcher without
//! waiting for their commands.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use uudev_core::Event;
use uudev_dispatch::Dispatcher;
use uudev_rules::Rule;

/// Ties the event stream, the rule set and the dispatcher together.
pub struct Engine {
    rules: Vec<Arc<Rule>>,
    dispatcher: Dispatcher,
    debug: bool,
}

impl Engine {
    pub fn new(rules: Vec<Rule>, dispatcher: Dispatcher, debug: bool) -> Self {
        Self {
            rules: rules.into_iter().map(Arc::new).collect(),
            dispatcher,
            debug,
        }
    }

    /// Consume events until the stream closes.
    ///
    /// Matching is synchronous and never blocks on command execution; the
    /// loop only ends when the event channel closes or the process is shut
    /// down externally.
    pub async fn run(&self, mut events: mpsc::Receiver<Event>) {
        while let Some(event) = events.recv().await {
            self.process(&event);
        }
        info!("event stream closed, stopping");
    }

    fn process(&self, event: &Event) {
        for rule in &self.rules {
            if rule.matches(event) {
                if self.debug {
                    let json = serde_json::to_string_pretty(event).unwrap_or_default();
                    debug!(rule = rule.name(), event = %json, "rule matched udev event");
                }
                self.dispatcher.dispatch(rule.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uudev_rules::load_rules;

    async fn run_engine_with_events(config: &str, events: Vec<Event>) {
        let rules = load_rules(config).unwrap();
        let engine = Engine::new(rules, Dispatcher::new(), false);

        let (tx, rx) = mpsc::channel(1);
        let feeder = tokio::spawn(async move {
            for event in events {
                tx.send(event).await.unwrap();
            }
            // tx drops here, closing the stream.
        });

        engine.run(rx).await;
        feeder.await.unwrap();
    }

    fn usb_add_event() -> Event {
        let mut event = Event::new();
        event.insert("SUBSYSTEM", "usb");
        event.insert("ACTION", "add");
        event
    }

    #[tokio::test]
    async fn test_matching_event_runs_command() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("fired");
        let config = format!(
            "name: usb hook\nenv:\n  SUBSYSTEM: ^usb$\nrun: touch {}\ndelay: 10ms\n",
            marker.display()
        );

        run_engine_with_events(&config, vec![usb_add_event()]).await;

        // The dispatch task outlives the loop; give it time to fire.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_non_matching_event_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("fired");
        let config = format!(
            "name: pci hook\nenv:\n  SUBSYSTEM: ^pci$\nrun: touch {}\ndelay: 10ms\n",
            marker.display()
        );

        run_engine_with_events(&config, vec![usb_add_event()]).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_event_storm_does_not_block_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("fired");
        let config = format!(
            "name: usb hook\nenv:\n  SUBSYSTEM: ^usb$\nrun: touch {}\ndelay: 50ms\n",
            marker.display()
        );

        // Rapid duplicate events for one physical action. Every dispatch
        // waits out its own delay off-loop; the engine must consume all of
        // them without waiting on any command.
        let events = vec![usb_add_event(), usb_add_event(), usb_add_event()];
        run_engine_with_events(&config, events).await;

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(marker.exists());
    }
}
