//! Ordered fan-out of task events.

use std::fmt;

use probe_frontend::{Log, TaskEvent, TaskListener};

/// Forwards every event to each listener in registration order. Lets
/// several observers share the task's single listener slot.
#[derive(Default)]
pub struct TaskListeners {
    listeners: Vec<Box<dyn TaskListener>>,
}

impl TaskListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, listener: Box<dyn TaskListener>) {
        self.listeners.push(listener);
    }

    pub fn with(mut self, listener: Box<dyn TaskListener>) -> Self {
        self.push(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl FromIterator<Box<dyn TaskListener>> for TaskListeners {
    fn from_iter<I: IntoIterator<Item = Box<dyn TaskListener>>>(iter: I) -> Self {
        Self {
            listeners: iter.into_iter().collect(),
        }
    }
}

impl TaskListener for TaskListeners {
    fn started(&mut self, event: &TaskEvent, log: &mut Log<'_>) {
        for listener in &mut self.listeners {
            listener.started(event, log);
        }
    }

    fn finished(&mut self, event: &TaskEvent, log: &mut Log<'_>) {
        for listener in &mut self.listeners {
            listener.finished(event, log);
        }
    }
}

impl fmt::Debug for TaskListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskListeners")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_frontend::{DiagnosticCollector, TaskEventKind};
    use std::sync::{Arc, Mutex};

    struct Recorder {
        tag: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl TaskListener for Recorder {
        fn started(&mut self, event: &TaskEvent, _log: &mut Log<'_>) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{} started {}", self.tag, event.kind));
        }

        fn finished(&mut self, event: &TaskEvent, _log: &mut Log<'_>) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{} finished {}", self.tag, event.kind));
        }
    }

    #[test]
    fn forwards_in_registration_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let recorder = |tag: &'static str| -> Box<dyn TaskListener> {
            Box::new(Recorder {
                tag,
                journal: Arc::clone(&journal),
            })
        };
        let mut listeners = TaskListeners::new().with(recorder("a")).with(recorder("b"));
        assert_eq!(listeners.len(), 2);

        let mut collector = DiagnosticCollector::new();
        let mut log = Log::new(&mut collector);
        let event = TaskEvent::new(TaskEventKind::Analyze, "A.probe");
        listeners.started(&event, &mut log);
        listeners.finished(&event, &mut log);

        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "a started analyze",
                "b started analyze",
                "a finished analyze",
                "b finished analyze",
            ]
        );
    }

    #[test]
    fn empty_multiplexer_is_a_no_op() {
        let mut listeners: TaskListeners = Vec::new().into_iter().collect();
        assert!(listeners.is_empty());
        let mut collector = DiagnosticCollector::new();
        let mut log = Log::new(&mut collector);
        listeners.started(&TaskEvent::new(TaskEventKind::Parse, "A.probe"), &mut log);
        assert!(collector.is_empty());
    }
}
