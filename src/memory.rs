use std::collections::VecDeque;

use crate::message::Message;

/// One human input and the reply it got.
#[derive(Clone, Debug, PartialEq)]
pub struct Exchange {
    pub human: String,
    pub ai: String,
}

/// Short-term memory that keeps only the last `k` exchanges.
#[derive(Clone, Debug)]
pub struct WindowMemory {
    k: usize,
    exchanges: VecDeque<Exchange>,
}

impl WindowMemory {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            exchanges: VecDeque::with_capacity(k),
        }
    }

    pub fn window(&self) -> usize {
        self.k
    }

    /// Record an exchange, evicting the oldest ones beyond the window.
    pub fn save_context(&mut self, human: impl Into<String>, ai: impl Into<String>) {
        self.exchanges.push_back(Exchange {
            human: human.into(),
            ai: ai.into(),
        });
        while self.exchanges.len() > self.k {
            self.exchanges.pop_front();
        }
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> + '_ {
        self.exchanges.iter()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Transcript of the window as `Human:` / `AI:` lines.
    pub fn buffer(&self) -> String {
        self.exchanges
            .iter()
            .map(|e| format!("Human: {}\nAI: {}", e.human, e.ai))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn as_messages(&self) -> Vec<Message> {
        self.exchanges
            .iter()
            .flat_map(|e| [Message::user(e.human.clone()), Message::assistant(e.ai.clone())])
            .collect()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}
