use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{self, Read, Write};

use tracing::debug;

use crate::interpreter::{LBRACKET, RBRACKET};

/// The machine state a custom operation may inspect and mutate.
///
/// After the handler returns, the engine advances the code pointer by one,
/// exactly as for a built-in opcode. A handler that wants execution to resume
/// at position `p` should therefore set `*code_pointer = p - 1`.
pub struct Machine<'a> {
    pub code_pointer: &'a mut usize,
    pub mem_pointer: &'a mut usize,
    pub memory: &'a mut [u8],
    /// The program fetched so far. Bytes past the end have not been read yet.
    pub code: &'a [u8],
    pub reader: &'a mut dyn Read,
    pub writer: &'a mut dyn Write,
}

impl Machine<'_> {
    /// The cell under the memory pointer, if there is one.
    pub fn cell(&mut self) -> Option<&mut u8> {
        self.memory.get_mut(*self.mem_pointer)
    }
}

/// A custom single-byte operation.
pub trait OperationHandler {
    fn apply(&self, machine: &mut Machine<'_>) -> io::Result<()>;
}

impl<F> OperationHandler for F
where
    F: Fn(&mut Machine<'_>) -> io::Result<()>,
{
    fn apply(&self, machine: &mut Machine<'_>) -> io::Result<()> {
        self(machine)
    }
}

/// Custom operations and forbidden opcodes, owned by one interpreter.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<u8, Box<dyn OperationHandler>>,
    forbidden: HashSet<u8>,
}

/// A loop with only one of its brackets makes no sense, so the two are
/// always forbidden or allowed together.
fn bracket_pair(opcode: u8) -> &'static [u8] {
    match opcode {
        LBRACKET | RBRACKET => &[LBRACKET, RBRACKET],
        _ => &[],
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `handler` with `opcode`, replacing any previous handler.
    pub fn register<H>(&mut self, opcode: u8, handler: H)
    where
        H: OperationHandler + 'static,
    {
        debug!(opcode = %char::from(opcode), "registering operation");
        self.handlers.insert(opcode, Box::new(handler));
    }

    /// Forbid each opcode in `opcodes`. Naming either bracket forbids both.
    pub fn forbid(&mut self, opcodes: &[u8]) {
        for &opcode in opcodes {
            match bracket_pair(opcode) {
                [] => {
                    self.forbidden.insert(opcode);
                }
                pair => self.forbidden.extend(pair.iter().copied()),
            }
            debug!(opcode = %char::from(opcode), "forbidding operation");
        }
    }

    /// Lift a prohibition. Naming either bracket allows both.
    pub fn allow(&mut self, opcode: u8) {
        match bracket_pair(opcode) {
            [] => {
                self.forbidden.remove(&opcode);
            }
            pair => {
                for b in pair {
                    self.forbidden.remove(b);
                }
            }
        }
    }

    pub fn is_forbidden(&self, opcode: u8) -> bool {
        self.forbidden.contains(&opcode)
    }

    pub fn handler_for(&self, opcode: u8) -> Option<&dyn OperationHandler> {
        self.handlers.get(&opcode).map(|h| h.as_ref())
    }

    /// Number of registered custom operations.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<char> = self.handlers.keys().map(|&b| char::from(b)).collect();
        handlers.sort_unstable();
        let mut forbidden: Vec<char> = self.forbidden.iter().map(|&b| char::from(b)).collect();
        forbidden.sort_unstable();
        f.debug_struct("Registry")
            .field("handlers", &handlers)
            .field("forbidden", &forbidden)
            .finish()
    }
}
