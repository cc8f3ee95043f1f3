use std::collections::HashMap;
use std::io::{self, Read, Stdin, Stdout, Write};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::registry::{Machine, OperationHandler, Registry};
use crate::scan::{next_byte, scan_byte};
use crate::stack::PositionStack;

/// The streaming tape interpreter.
///
/// Program text and run-time input share one byte stream. The program is
/// fetched lazily: a byte is read only when the code pointer reaches the end
/// of what has been fetched so far, and `,` reads the very next byte of the
/// same stream as data. A line terminator read as a program byte ends the run.
///
/// Loops are matched on the fly. `[` on a zero cell whose `]` has never been
/// seen enters skip mode: ordinary opcodes are passed over until the matching
/// `]` is fetched. Every observed pairing is cached in a loop table so the
/// next zero entry into the same loop jumps straight to its end.
pub struct Interpreter<R = Stdin, W = Stdout> {
    config: InterpreterConfig,
    reader: R,
    writer: W,
    registry: Registry,
}

pub const GREATER: u8 = b'>';
pub const LESS: u8 = b'<';
pub const PLUS: u8 = b'+';
pub const MINUS: u8 = b'-';
pub const DOT: u8 = b'.';
pub const COMMA: u8 = b',';
pub const LBRACKET: u8 = b'[';
pub const RBRACKET: u8 = b']';
pub const NEWLINE: u8 = b'\n';

pub const DEFAULT_MEMORY_LEN: usize = 128;

/// Configuration for an interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Number of memory cells. Zero selects `DEFAULT_MEMORY_LEN`.
    pub memory_len: usize,
    /// Maximum opcodes dispatched per run (`None` for no limit).
    pub step_limit: Option<usize>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            memory_len: DEFAULT_MEMORY_LEN,
            step_limit: None,
        }
    }
}

impl InterpreterConfig {
    pub fn with_memory_len(memory_len: usize) -> Self {
        Self {
            memory_len,
            ..Self::default()
        }
    }

    fn normalized(self) -> Self {
        let memory_len = if self.memory_len == 0 {
            DEFAULT_MEMORY_LEN
        } else {
            self.memory_len
        };
        Self { memory_len, ..self }
    }
}

/// Counters from a run that completed cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Opcodes dispatched. Opcodes passed over in skip mode are not counted.
    pub steps: usize,
    /// Bytes in the program buffer when the run ended.
    pub program_len: usize,
    /// Zero-cell loop entries resolved through the loop table.
    pub memoized_jumps: usize,
}

impl Interpreter<Stdin, Stdout> {
    /// An interpreter reading from standard input and writing to standard output.
    pub fn new(config: InterpreterConfig) -> Self {
        Self::with_io(config, io::stdin(), io::stdout())
    }
}

impl<R: Read, W: Write> Interpreter<R, W> {
    pub fn with_io(config: InterpreterConfig, reader: R, writer: W) -> Self {
        Self {
            config: config.normalized(),
            reader,
            writer,
            registry: Registry::new(),
        }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Register a custom operation for `opcode`, replacing any earlier one.
    pub fn add_operation<H>(&mut self, opcode: u8, handler: H)
    where
        H: OperationHandler + 'static,
    {
        self.registry.register(opcode, handler);
    }

    /// Forbid opcodes. Fetching a forbidden opcode halts the run.
    pub fn forbid(&mut self, opcodes: &[u8]) {
        self.registry.forbid(opcodes);
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Fetch and execute from the input stream until a line terminator is
    /// fetched as a program byte, the stream ends, or a fatal error occurs.
    ///
    /// Memory, program buffer, pointers and loop bookkeeping are fresh for
    /// every run. Registered and forbidden operations carry over.
    pub fn run(&mut self) -> Result<RunStats> {
        debug!(memory_len = self.config.memory_len, "starting run");
        let mut exec = Execution::new(self.config);
        match exec.execute(&self.registry, &mut self.reader, &mut self.writer) {
            Ok(()) => {
                self.writer.flush().map_err(Error::Write)?;
                let stats = exec.stats();
                debug!(
                    steps = stats.steps,
                    program_len = stats.program_len,
                    memoized_jumps = stats.memoized_jumps,
                    "run finished"
                );
                Ok(stats)
            }
            Err(e) => {
                debug!(
                    error = %e,
                    code_pointer = exec.code_pointer,
                    mem_pointer = exec.mem_pointer,
                    "run halted"
                );
                Err(e)
            }
        }
    }
}

/// State of a single run.
struct Execution {
    memory: Vec<u8>,
    code: Vec<u8>,
    code_pointer: usize,
    mem_pointer: usize,
    /// Loop start position to loop end position.
    loop_table: HashMap<usize, usize>,
    brackets: PositionStack,
    /// Loops entered on a zero cell whose end has not been fetched yet.
    unfinished: PositionStack,
    step_limit: Option<usize>,
    steps: usize,
    memoized_jumps: usize,
}

impl Execution {
    fn new(config: InterpreterConfig) -> Self {
        Self {
            memory: vec![0u8; config.memory_len],
            code: Vec::new(),
            code_pointer: 0,
            mem_pointer: 0,
            loop_table: HashMap::new(),
            brackets: PositionStack::new(),
            unfinished: PositionStack::new(),
            step_limit: config.step_limit,
            steps: 0,
            memoized_jumps: 0,
        }
    }

    fn stats(&self) -> RunStats {
        RunStats {
            steps: self.steps,
            program_len: self.code.len(),
            memoized_jumps: self.memoized_jumps,
        }
    }

    #[inline(always)]
    fn cell(&mut self) -> Result<&mut u8> {
        let (pointer, len) = (self.mem_pointer, self.memory.len());
        self.memory
            .get_mut(pointer)
            .ok_or(Error::CellOutOfRange { pointer, len })
    }

    fn execute<R: Read, W: Write>(
        &mut self,
        registry: &Registry,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<()> {
        loop {
            if self.code_pointer == self.code.len() {
                // End of stream ends the program just like a terminator.
                let Some(byte) = scan_byte(reader)? else {
                    return Ok(());
                };
                if byte == NEWLINE {
                    return Ok(());
                }
                if registry.is_forbidden(byte) {
                    return Err(Error::Forbidden(byte));
                }
                self.code.push(byte);
            }

            let op = self.code[self.code_pointer];

            // Brackets are still dispatched in skip mode so nesting is tracked.
            if !self.unfinished.is_empty() && op != LBRACKET && op != RBRACKET {
                self.code_pointer += 1;
                continue;
            }

            if let Some(limit) = self.step_limit {
                if self.steps >= limit {
                    return Err(Error::StepLimitExceeded { limit });
                }
            }
            self.steps += 1;

            match op {
                GREATER => {
                    if self.mem_pointer >= self.memory.len() {
                        return Err(Error::MemoryOverflow);
                    }
                    self.mem_pointer += 1;
                }
                LESS => {
                    if self.mem_pointer == 0 {
                        return Err(Error::MemoryUnderflow);
                    }
                    self.mem_pointer -= 1;
                }
                MINUS => {
                    let cell = self.cell()?;
                    *cell = cell.wrapping_sub(1);
                }
                PLUS => {
                    let cell = self.cell()?;
                    *cell = cell.wrapping_add(1);
                }
                DOT => {
                    let value = *self.cell()?;
                    writer.write_all(&[value]).map_err(Error::Write)?;
                }
                COMMA => {
                    // Output written so far must be visible before the read blocks.
                    writer.flush().map_err(Error::Write)?;
                    let value = next_byte(reader)?;
                    *self.cell()? = value;
                }
                LBRACKET => {
                    let start = self.code_pointer;
                    self.brackets.push(start);
                    if *self.cell()? == 0 {
                        match self.loop_table.get(&start) {
                            Some(&end) => {
                                // Land on the `]` so it pops the bracket pushed above.
                                trace!(start, end, "memoized loop jump");
                                self.memoized_jumps += 1;
                                self.code_pointer = end;
                                continue;
                            }
                            None => self.unfinished.push(start),
                        }
                    }
                }
                RBRACKET => {
                    let end = self.code_pointer;
                    let start = self
                        .brackets
                        .pop()
                        .ok_or(Error::UnmatchedLoopEnd { position: end })?;
                    if self.loop_table.insert(start, end).is_none() {
                        trace!(start, end, "loop end recorded");
                    }
                    let repeat = *self.cell()? != 0;
                    // This pairing resolves the innermost unfinished loop, if any.
                    self.unfinished.pop();
                    if repeat {
                        self.code_pointer = start;
                        continue;
                    }
                }
                other => {
                    if let Some(handler) = registry.handler_for(other) {
                        let mut machine = Machine {
                            code_pointer: &mut self.code_pointer,
                            mem_pointer: &mut self.mem_pointer,
                            memory: &mut self.memory,
                            code: &self.code,
                            reader: &mut *reader,
                            writer: &mut *writer,
                        };
                        handler
                            .apply(&mut machine)
                            .map_err(|source| Error::Operation { opcode: other, source })?;
                    }
                }
            }

            self.advance()?;
        }
    }

    /// Step past the current opcode. Only a custom operation can leave the
    /// code pointer somewhere this fails.
    fn advance(&mut self) -> Result<()> {
        let len = self.code.len();
        match self.code_pointer.checked_add(1) {
            Some(next) if next <= len => {
                self.code_pointer = next;
                Ok(())
            }
            _ => Err(Error::CodeOutOfRange {
                pointer: self.code_pointer,
                len,
            }),
        }
    }
}
