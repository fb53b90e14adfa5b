//! # Commands
//!
//! Reversible operations executed as stroke jobs. When a command job runs, its command is kept by the
//! stroke in a [`retained::CommandLog`] so the stroke can be rewound on cancel or suspend. After a clean
//! finish the retained commands are handed as one [`CommandGroup`] to the [`UndoStore`], if any.

pub mod retained;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("command applied to a state that does not match the one it was built for")]
    MismatchedState,
    #[error("resource referenced by the command is not found")]
    UnknownResource,
    #[error("command makes no changes")]
    NoOp,
}

/// An operation that can be applied and reverted.
///
/// If `redo` or `undo` returns an error, the state it touches should *not* be observably changed.
pub trait UndoCommand: Send {
    fn redo(&mut self) -> Result<(), CommandError>;
    fn undo(&mut self) -> Result<(), CommandError>;
    /// Human readable name, for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Many commands treated as one. Redone in order, undone in reverse.
#[derive(Default)]
pub struct CommandGroup {
    commands: Vec<Box<dyn UndoCommand>>,
}
impl CommandGroup {
    #[must_use]
    pub fn new(commands: Vec<Box<dyn UndoCommand>>) -> Self {
        Self { commands }
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
impl UndoCommand for CommandGroup {
    fn redo(&mut self) -> Result<(), CommandError> {
        for idx in 0..self.commands.len() {
            if let Err(e) = self.commands[idx].redo() {
                // Keep the all-or-nothing contract: roll back the ones that succeeded.
                for done in self.commands[..idx].iter_mut().rev() {
                    if let Err(undo_err) = done.undo() {
                        log::error!("rollback of {} failed: {undo_err}", done.name());
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
    fn undo(&mut self) -> Result<(), CommandError> {
        let len = self.commands.len();
        for idx in (0..len).rev() {
            if let Err(e) = self.commands[idx].undo() {
                for undone in &mut self.commands[idx + 1..] {
                    if let Err(redo_err) = undone.redo() {
                        log::error!("rollback of {} failed: {redo_err}", undone.name());
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
    fn name(&self) -> &str {
        "CommandGroup"
    }
}
impl std::fmt::Debug for CommandGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.commands.iter().map(|command| command.name()))
            .finish()
    }
}

/// Sink for the commands of cleanly finished strokes (the editor's undo history).
pub trait UndoStore: Send + Sync {
    fn push(&self, command: CommandGroup);
}

#[cfg(test)]
mod test {
    use super::{CommandError, CommandGroup, UndoCommand};
    use std::sync::Arc;

    struct Push {
        value: i32,
        target: Arc<parking_lot::Mutex<Vec<i32>>>,
        fail: bool,
    }
    impl UndoCommand for Push {
        fn redo(&mut self) -> Result<(), CommandError> {
            if self.fail {
                return Err(CommandError::NoOp);
            }
            self.target.lock().push(self.value);
            Ok(())
        }
        fn undo(&mut self) -> Result<(), CommandError> {
            match self.target.lock().pop() {
                Some(v) if v == self.value => Ok(()),
                _ => Err(CommandError::MismatchedState),
            }
        }
    }

    #[test]
    fn group_round_trip() {
        let target = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut group = CommandGroup::new(
            (1..=3)
                .map(|value| -> Box<dyn UndoCommand> {
                    Box::new(Push {
                        value,
                        target: target.clone(),
                        fail: false,
                    })
                })
                .collect(),
        );
        group.redo().unwrap();
        assert_eq!(*target.lock(), [1, 2, 3]);
        group.undo().unwrap();
        assert!(target.lock().is_empty());
    }
    #[test]
    fn group_redo_is_all_or_nothing() {
        let target = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let commands: Vec<Box<dyn UndoCommand>> = vec![
            Box::new(Push {
                value: 1,
                target: target.clone(),
                fail: false,
            }),
            Box::new(Push {
                value: 2,
                target: target.clone(),
                fail: true,
            }),
        ];
        let mut group = CommandGroup::new(commands);
        assert_eq!(group.redo(), Err(CommandError::NoOp));
        assert!(target.lock().is_empty());
    }
}
