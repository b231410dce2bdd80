//! FIFO of inbound commands awaiting dispatch.

use std::collections::VecDeque;

use crate::command::Command;

/// Commands decoded from server responses, in arrival order.
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: VecDeque<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    pub fn pop(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    /// Pop the oldest command unless a request is still being awaited.
    pub fn pop_if_ready(&mut self, awaiting: bool) -> Option<Command> {
        if awaiting {
            return None;
        }
        self.pop()
    }

    pub fn peek(&self) -> Option<&Command> {
        self.commands.front()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop every queued command, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.commands.len();
        self.commands.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandType;
    use bytes::Bytes;

    fn command(cmd_id: u16) -> Command {
        Command {
            cmd_id,
            cmd_type: CommandType::CardOperation,
            data: Bytes::new(),
            nonce: 0,
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = CommandQueue::new();
        queue.push(command(1));
        queue.push(command(2));
        queue.push(command(3));

        assert_eq!(queue.peek().map(|c| c.cmd_id), Some(1));
        assert_eq!(queue.pop().map(|c| c.cmd_id), Some(1));
        assert_eq!(queue.pop().map(|c| c.cmd_id), Some(2));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_pop_if_ready_gated_by_awaiting() {
        let mut queue = CommandQueue::new();
        queue.push(command(1));

        assert!(queue.pop_if_ready(true).is_none());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_if_ready(false).map(|c| c.cmd_id), Some(1));
    }

    #[test]
    fn test_clear_reports_dropped() {
        let mut queue = CommandQueue::new();
        queue.push(command(1));
        queue.push(command(2));

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }
}
