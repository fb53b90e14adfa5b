//! The per-stroke log of commands that have been redone and may still need undoing.

use super::{CommandGroup, UndoCommand};

/// Ordered log of a stroke's executed commands.
///
/// Commands are ordered by the moment their `redo` was *called*, not by when it returned, so that
/// concurrently executed command jobs are still undone strictly in reverse call order.
#[derive(Default)]
pub struct CommandLog {
    /// Sorted by redo sequence number.
    live: Vec<(u64, Box<dyn UndoCommand>)>,
    /// Commands undone by a suspend, in original redo order, waiting to be redone by a resume.
    rewound: Vec<Box<dyn UndoCommand>>,
}
impl CommandLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Record a command whose redo was started with sequence number `seq`.
    pub fn record(&mut self, seq: u64, command: Box<dyn UndoCommand>) {
        // Almost always the last one, but concurrent jobs may finish out of order.
        let idx = self.live.partition_point(|(other, _)| *other < seq);
        self.live.insert(idx, (seq, command));
    }
    /// Number of commands that are applied right now.
    #[must_use]
    pub fn live_len(&self) -> usize {
        self.live.len()
    }
    /// Number of commands waiting on a resume.
    #[must_use]
    pub fn rewound_len(&self) -> usize {
        self.rewound.len()
    }
    /// Undo every live command, newest first, and forget them. Rewound commands are
    /// already undone and are simply dropped.
    ///
    /// Returns the number of commands undone.
    pub fn undo_all(&mut self) -> usize {
        let count = self.live.len();
        Self::undo_reverse(&mut self.live);
        self.live.clear();
        self.rewound.clear();
        count
    }
    /// Undo every live command, newest first, keeping them to be redone by [`Self::take_rewound`].
    pub fn rewind(&mut self) {
        Self::undo_reverse(&mut self.live);
        // Earlier rewinds without a resume stay in front, they were redone first.
        self.rewound
            .extend(self.live.drain(..).map(|(_, command)| command));
    }
    /// Take the rewound commands, in their original redo order.
    #[must_use]
    pub fn take_rewound(&mut self) -> Vec<Box<dyn UndoCommand>> {
        std::mem::take(&mut self.rewound)
    }
    /// Move all live commands out as one group, leaving the log empty.
    #[must_use]
    pub fn take_group(&mut self) -> CommandGroup {
        self.rewound.clear();
        CommandGroup::new(self.live.drain(..).map(|(_, command)| command).collect())
    }
    fn undo_reverse(commands: &mut [(u64, Box<dyn UndoCommand>)]) {
        for (seq, command) in commands.iter_mut().rev() {
            // A failed undo can't be retried meaningfully; the remaining ones are still attempted.
            if let Err(e) = command.undo() {
                log::error!("undo of {} (#{seq}) failed: {e}", command.name());
            } else {
                log::trace!("undid {} (#{seq})", command.name());
            }
        }
    }
}
impl std::fmt::Debug for CommandLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandLog")
            .field("live", &self.live.len())
            .field("rewound", &self.rewound.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::CommandLog;
    use crate::commands::{CommandError, UndoCommand};
    use std::sync::Arc;

    type Calls = Arc<parking_lot::Mutex<Vec<String>>>;
    struct Named(&'static str, Calls);
    impl UndoCommand for Named {
        fn redo(&mut self) -> Result<(), CommandError> {
            self.1.lock().push(format!("redo {}", self.0));
            Ok(())
        }
        fn undo(&mut self) -> Result<(), CommandError> {
            self.1.lock().push(format!("undo {}", self.0));
            Ok(())
        }
    }

    #[test]
    fn undo_in_reverse_call_order() {
        let calls = Calls::default();
        let mut log = CommandLog::new();
        // Recorded out of order, as if concurrent jobs finished late.
        log.record(2, Box::new(Named("b", calls.clone())));
        log.record(1, Box::new(Named("a", calls.clone())));
        log.record(3, Box::new(Named("c", calls.clone())));
        assert_eq!(log.undo_all(), 3);
        assert_eq!(*calls.lock(), ["undo c", "undo b", "undo a"]);
        assert_eq!(log.live_len(), 0);
    }
    #[test]
    fn rewind_then_take() {
        let calls = Calls::default();
        let mut log = CommandLog::new();
        log.record(1, Box::new(Named("a", calls.clone())));
        log.record(2, Box::new(Named("b", calls.clone())));
        log.rewind();
        assert_eq!(*calls.lock(), ["undo b", "undo a"]);
        assert_eq!(log.rewound_len(), 2);

        let mut taken = log.take_rewound();
        assert_eq!(log.rewound_len(), 0);
        for command in &mut taken {
            command.redo().unwrap();
        }
        assert_eq!(&calls.lock()[2..], ["redo a", "redo b"]);
    }
    #[test]
    fn undo_all_skips_rewound() {
        let calls = Calls::default();
        let mut log = CommandLog::new();
        log.record(1, Box::new(Named("a", calls.clone())));
        log.rewind();
        calls.lock().clear();
        // Already undone by the rewind, must not be undone twice.
        assert_eq!(log.undo_all(), 0);
        assert!(calls.lock().is_empty());
    }
}
