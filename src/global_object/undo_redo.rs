//! Command-pattern undo/redo history
//!
//! Every recorded mutation is an [`UndoCommand`] that knows how to apply its
//! new state (`redo`) and restore its old state (`undo`) on a target. The
//! [`UndoStack`] executes commands as they are pushed, keeps the executed ones
//! in a bounded history, and groups consecutive pushes into macros that undo
//! and redo as a single unit.
//!
//! ```text
//!   push(cmd) ──► cmd.redo(target) ──► history ◄──undo()/redo()──► future
//!                                          ▲
//!                     begin_macro/end_macro│ CommandHolder { cmd, cmd, ... }
//! ```

use crate::error::Result;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Errors raised by misuse of the undo stack
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UndoError {
    #[error("end_macro called with no open macro")]
    NoOpenMacro,

    #[error("cannot {action} while macro '{label}' is open")]
    MacroOpen { action: &'static str, label: String },
}

/// A reversible mutation of a target of type `T`
pub trait UndoCommand<T> {
    /// Apply the new state
    fn redo(&self, target: &mut T) -> Result<()>;

    /// Restore the old state
    fn undo(&self, target: &mut T) -> Result<()>;

    /// Human-readable label
    fn text(&self) -> &str;
}

/// Raw property setter: writes `value` into the item `key` of the target
pub type Setter<T, V> = fn(&mut T, &str, V) -> Result<()>;

/// Command that sets one property of one item through a raw setter
pub struct PropertyStack<T, V> {
    key: String,
    setter: Setter<T, V>,
    old: V,
    new: V,
    text: String,
}

impl<T, V: Clone> PropertyStack<T, V> {
    pub fn new(key: impl Into<String>, setter: Setter<T, V>, old: V, new: V, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            setter,
            old,
            new,
            text: text.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T, V: Clone> UndoCommand<T> for PropertyStack<T, V> {
    fn redo(&self, target: &mut T) -> Result<()> {
        (self.setter)(target, &self.key, self.new.clone())
    }

    fn undo(&self, target: &mut T) -> Result<()> {
        (self.setter)(target, &self.key, self.old.clone())
    }

    fn text(&self) -> &str {
        &self.text
    }
}

/// A macro: an ordered group of commands treated as one
pub struct CommandHolder<T> {
    text: String,
    commands: Vec<Box<dyn UndoCommand<T>>>,
}

impl<T> CommandHolder<T> {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            commands: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<T> UndoCommand<T> for CommandHolder<T> {
    /// Replay every member in order; on failure the members already replayed
    /// are undone again, so the macro applies all or nothing
    fn redo(&self, target: &mut T) -> Result<()> {
        for (done, command) in self.commands.iter().enumerate() {
            if let Err(e) = command.redo(target) {
                for applied in self.commands[..done].iter().rev() {
                    applied.undo(target)?;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Revert every member in reverse order; on failure the members already
    /// reverted are replayed again
    fn undo(&self, target: &mut T) -> Result<()> {
        let n = self.commands.len();
        for (done, command) in self.commands.iter().rev().enumerate() {
            if let Err(e) = command.undo(target) {
                for reverted in &self.commands[n - done..] {
                    reverted.redo(target)?;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn text(&self) -> &str {
        &self.text
    }
}

/// Undo/redo history over a target of type `T`
pub struct UndoStack<T> {
    history: VecDeque<Box<dyn UndoCommand<T>>>,
    future: Vec<Box<dyn UndoCommand<T>>>,
    macros: Vec<CommandHolder<T>>,
    enabled: bool,
    max_history: Option<usize>,
}

impl<T: 'static> Default for UndoStack<T> {
    fn default() -> Self {
        Self::new(true, None)
    }
}

impl<T: 'static> UndoStack<T> {
    pub fn new(enabled: bool, max_history: Option<usize>) -> Self {
        Self {
            history: VecDeque::new(),
            future: Vec::new(),
            macros: Vec::new(),
            enabled,
            max_history,
        }
    }

    /// Execute `command` on `target` and record it when the stack is enabled
    ///
    /// A recorded push clears the redo history. A failing command is neither
    /// recorded nor does it touch the history.
    pub fn push(&mut self, command: Box<dyn UndoCommand<T>>, target: &mut T) -> Result<()> {
        command.redo(target)?;
        if !self.enabled {
            return Ok(());
        }

        match self.macros.last_mut() {
            Some(open) => open.commands.push(command),
            None => self.record(command),
        }
        self.future.clear();
        Ok(())
    }

    fn record(&mut self, command: Box<dyn UndoCommand<T>>) {
        self.history.push_back(command);
        if let Some(limit) = self.max_history {
            while self.history.len() > limit {
                self.history.pop_front();
            }
        }
    }

    /// Open a macro; pushes until the matching [`end_macro`](Self::end_macro)
    /// form one undo unit
    pub fn begin_macro(&mut self, text: impl Into<String>) {
        self.macros.push(CommandHolder::new(text));
    }

    /// Close the innermost macro
    ///
    /// An empty macro is discarded. A nested macro becomes a single command of
    /// its parent. Commands recorded before the stack was disabled are kept.
    pub fn end_macro(&mut self) -> Result<()> {
        let closed = self.macros.pop().ok_or(UndoError::NoOpenMacro)?;
        if closed.is_empty() {
            return Ok(());
        }

        match self.macros.last_mut() {
            Some(parent) => parent.commands.push(Box::new(closed)),
            None => self.record(Box::new(closed)),
        }
        Ok(())
    }

    pub fn is_macro_open(&self) -> bool {
        !self.macros.is_empty()
    }

    fn ensure_closed(&self, action: &'static str) -> Result<()> {
        match self.macros.last() {
            Some(open) => Err(UndoError::MacroOpen {
                action,
                label: open.text.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Undo the most recent command; `Ok(false)` when there is nothing to undo
    pub fn undo(&mut self, target: &mut T) -> Result<bool> {
        self.ensure_closed("undo")?;
        let Some(command) = self.history.pop_back() else {
            return Ok(false);
        };

        debug!(text = command.text(), "undo");
        match command.undo(target) {
            Ok(()) => {
                self.future.push(command);
                Ok(true)
            }
            Err(e) => {
                self.history.push_back(command);
                Err(e)
            }
        }
    }

    /// Redo the most recently undone command; `Ok(false)` when there is nothing
    /// to redo
    pub fn redo(&mut self, target: &mut T) -> Result<bool> {
        self.ensure_closed("redo")?;
        let Some(command) = self.future.pop() else {
            return Ok(false);
        };

        debug!(text = command.text(), "redo");
        match command.redo(target) {
            Ok(()) => {
                self.history.push_back(command);
                Ok(true)
            }
            Err(e) => {
                self.future.push(command);
                Err(e)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Label of the command [`undo`](Self::undo) would revert
    pub fn undo_text(&self) -> Option<&str> {
        self.history.back().map(|c| c.text())
    }

    /// Label of the command [`redo`](Self::redo) would replay
    pub fn redo_text(&self) -> Option<&str> {
        self.future.last().map(|c| c.text())
    }

    pub fn undo_len(&self) -> usize {
        self.history.len()
    }

    pub fn redo_len(&self) -> usize {
        self.future.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable recording; existing history is kept
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Drop both histories and any open macros
    pub fn clear(&mut self) {
        self.history.clear();
        self.future.clear();
        self.macros.clear();
    }
}

impl<T> fmt::Debug for UndoStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoStack")
            .field("undo_len", &self.history.len())
            .field("redo_len", &self.future.len())
            .field("open_macros", &self.macros.len())
            .field("enabled", &self.enabled)
            .field("max_history", &self.max_history)
            .finish()
    }
}
