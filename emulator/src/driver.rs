//! Execution driver
//!
//! The driver owns one processor and its memory, and decides per block entry whether to
//! interpret or to run translated code. Every block entry address moves through
//!
//! ```text
//! Interpreting --(hits reach threshold)--> Compiling --(ok)--> RunningCompiled
//!      ^                                      |
//!      +------------(failure: pinned)---------+
//! ```
//!
//! A pinned entry is never compiled again until it is invalidated. Invalidation drops compiled
//! blocks and counters and bumps the epoch, so results of background compilations started
//! before it are discarded on arrival.
//!
//! With a background worker, an entry that becomes hot is only queued once execution has
//! reached a different block entry, so a block is never compiled while it is executing.

use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    thread::JoinHandle,
};

use axp_core::{
    AccessKind, AccessSize, CpuState, MemFault, Memory, ProcessorContext, Trap, TrapVectors,
};
use axp_decoder::decode;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::{
    dispatch::{TableError, Tables},
    interp::{self, ExecContext, Flow},
    jit::{compile_block, CompileError, CompiledBlock, JIT_SUPPORTED},
    options::EmuOptions,
};

/// Execution state of one block entry address
#[derive(Debug, Clone)]
pub enum BlockState {
    Interpreting {
        hits: u32,
        /// Compilation failed; stays interpreted until invalidated
        pinned: bool,
    },
    Compiling,
    RunningCompiled(Arc<CompiledBlock>),
}

/// Why [`Driver::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunExit {
    /// HALT retired
    Halted,
    /// The step budget is used up
    StepLimit,
    /// A trap was raised with `stop_on_trap` set; the pc is left at the trapping instruction
    Trapped(Trap),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriverStats {
    pub interpreted: u64,
    pub compiled_runs: u64,
    /// Instructions retired inside compiled blocks
    pub compiled_instructions: u64,
    pub compilations: u64,
    pub compile_failures: u64,
    pub traps: u64,
    pub invalidations: u64,
}

struct CompileJob {
    start: u64,
    words: Vec<u32>,
    epoch: u64,
}

struct CompileResult {
    start: u64,
    epoch: u64,
    result: Result<CompiledBlock, CompileError>,
}

/// Background compiler thread and its channels
struct Worker {
    jobs: Option<Sender<CompileJob>>,
    results: Receiver<CompileResult>,
    handle: Option<JoinHandle<()>>,
    in_flight: usize,
}

impl Worker {
    fn spawn(tables: Arc<Tables>) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<CompileJob>();
        let (result_tx, result_rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            for job in job_rx {
                let result = compile_block(&tables, job.start, &job.words);
                let done = CompileResult { start: job.start, epoch: job.epoch, result };
                if result_tx.send(done).is_err() {
                    break;
                }
            }
        });
        Self { jobs: Some(job_tx), results: result_rx, handle: Some(handle), in_flight: 0 }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("background compiler panicked");
            }
        }
    }
}

pub struct Driver<M: Memory> {
    cpu: CpuState,
    mem: M,
    tables: Arc<Tables>,
    options: EmuOptions,
    jit_enabled: bool,
    blocks: HashMap<u64, BlockState>,
    epoch: u64,
    stats: DriverStats,
    worker: Option<Worker>,
    /// The next instruction starts a block
    at_block_entry: bool,
    /// Instructions interpreted since the last block entry
    run_len: usize,
    /// Hot entry waiting for execution to leave it before it goes to the worker
    deferred: Option<u64>,
}

impl<M: Memory> Driver<M> {
    /// Build the dispatch tables and a driver starting at `entry`
    pub fn new(mem: M, entry: u64, options: EmuOptions) -> Result<Self, TableError> {
        Ok(Self::with_tables(mem, entry, options, Arc::new(Tables::build()?)))
    }

    pub fn with_tables(mem: M, entry: u64, options: EmuOptions, tables: Arc<Tables>) -> Self {
        let jit_enabled = options.jit && JIT_SUPPORTED;
        if options.jit && !JIT_SUPPORTED {
            warn!("translated code cannot run on this host, interpreting only");
        }
        let worker = (jit_enabled && options.background_compile)
            .then(|| Worker::spawn(Arc::clone(&tables)));
        Self {
            cpu: CpuState::new(entry),
            mem,
            tables,
            options,
            jit_enabled,
            blocks: HashMap::new(),
            epoch: 0,
            stats: DriverStats::default(),
            worker,
            at_block_entry: true,
            run_len: 0,
            deferred: None,
        }
    }

    pub fn cpu(&self) -> &CpuState {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CpuState {
        &mut self.cpu
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }

    /// Memory for the caller to patch; patching code requires [`Driver::invalidate`]
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    pub fn tables(&self) -> &Arc<Tables> {
        &self.tables
    }

    pub fn options(&self) -> &EmuOptions {
        &self.options
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    pub fn jit_enabled(&self) -> bool {
        self.jit_enabled
    }

    /// Invalidation epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn block_state(&self, address: u64) -> Option<&BlockState> {
        self.blocks.get(&address)
    }

    /// Continue execution at `pc`, which becomes a block entry
    pub fn set_pc(&mut self, pc: u64) {
        self.cpu.set_program_counter(pc);
        self.enter_block();
    }

    fn enter_block(&mut self) {
        self.at_block_entry = true;
        self.run_len = 0;
    }

    // Invalidation

    /// Drop every compiled block covering `address` and the counter of the entry at `address`
    pub fn invalidate(&mut self, address: u64) {
        self.epoch += 1;
        self.stats.invalidations += 1;
        self.deferred = None;
        self.blocks.retain(|&start, state| match state {
            BlockState::RunningCompiled(block) => !block.covers(address),
            BlockState::Compiling => false,
            BlockState::Interpreting { .. } => start != address,
        });
        debug!("invalidated {:#x}, epoch {}", address, self.epoch);
    }

    /// Drop all translated code and counters
    pub fn invalidate_all(&mut self) {
        self.epoch += 1;
        self.stats.invalidations += 1;
        self.deferred = None;
        self.blocks.clear();
        debug!("invalidated all blocks, epoch {}", self.epoch);
    }

    // Execution

    /// Execute steps until HALT, a surfaced trap, or `max_steps` (falling back to the configured
    /// limit)
    ///
    /// A step is one interpreted instruction, one run of a compiled block, or one trap delivery.
    pub fn run(&mut self, max_steps: Option<u64>) -> RunExit {
        let limit = max_steps.or(self.options.max_steps);
        let mut steps = 0u64;
        loop {
            if limit.is_some_and(|limit| steps >= limit) {
                return RunExit::StepLimit;
            }
            if let Some(exit) = self.step() {
                return exit;
            }
            steps += 1;
        }
    }

    /// Execute one step; `None` means execution can continue
    pub fn step(&mut self) -> Option<RunExit> {
        if self.cpu.halted {
            return Some(RunExit::Halted);
        }
        if self.at_block_entry {
            self.at_block_entry = false;
            self.run_len = 0;
            if let Some(block) = self.visit(self.cpu.pc) {
                return self.run_compiled(&block);
            }
        }
        self.interpret_one()
    }

    /// Count a visit to the block entry `pc` and return its compiled block, if any
    fn visit(&mut self, pc: u64) -> Option<Arc<CompiledBlock>> {
        if !self.jit_enabled {
            return None;
        }
        self.drain_results();
        self.queue_deferred(pc);

        let threshold = self.options.hot_threshold;
        let state =
            self.blocks.entry(pc).or_insert(BlockState::Interpreting { hits: 0, pinned: false });
        match state {
            BlockState::RunningCompiled(block) => Some(Arc::clone(block)),
            BlockState::Compiling => None,
            BlockState::Interpreting { hits, pinned } => {
                *hits = hits.saturating_add(1);
                if *pinned || *hits < threshold {
                    return None;
                }
                if self.worker.is_some() {
                    self.deferred = Some(pc);
                    return None;
                }
                self.compile(pc);
                match self.blocks.get(&pc) {
                    Some(BlockState::RunningCompiled(block)) => Some(Arc::clone(block)),
                    _ => None,
                }
            }
        }
    }

    /// Hand the deferred entry to the worker once execution is at another entry than `pc`
    fn queue_deferred(&mut self, pc: u64) {
        let Some(entry) = self.deferred.filter(|&entry| entry != pc) else {
            return;
        };
        self.deferred = None;
        if matches!(self.blocks.get(&entry), Some(BlockState::Interpreting { pinned: false, .. })) {
            self.compile(entry);
        }
    }

    /// Move `pc` to Compiling and translate it, inline or on the worker
    fn compile(&mut self, pc: u64) {
        self.blocks.insert(pc, BlockState::Compiling);
        self.stats.compilations += 1;
        debug!("compiling block at {:#x}", pc);

        let words = match self.fetch_block(pc) {
            Ok(words) => words,
            Err(fault) => {
                warn!("cannot fetch block at {:#x}: {}", pc, fault);
                self.compile_failed(pc);
                return;
            }
        };

        let words = match self.send_job(pc, words) {
            Ok(()) => return,
            Err(words) => words,
        };
        let result = compile_block(&self.tables, pc, &words);
        self.install(pc, result);
    }

    /// Hand a block to the worker; the words come back when there is no worker to take them
    fn send_job(&mut self, start: u64, words: Vec<u32>) -> Result<(), Vec<u32>> {
        let Some(worker) = &mut self.worker else {
            return Err(words);
        };
        let job = CompileJob { start, words, epoch: self.epoch };
        let sent = match &worker.jobs {
            Some(jobs) => jobs.send(job).map_err(|err| err.0.words),
            None => Err(job.words),
        };
        match sent {
            Ok(()) => {
                worker.in_flight += 1;
                Ok(())
            }
            Err(words) => {
                warn!("background compiler is gone, compiling inline");
                self.worker = None;
                Err(words)
            }
        }
    }

    fn install(&mut self, pc: u64, result: Result<CompiledBlock, CompileError>) {
        match result {
            Ok(block) => {
                self.blocks.insert(pc, BlockState::RunningCompiled(Arc::new(block)));
            }
            Err(err) => {
                warn!("compilation of {:#x} failed: {}", pc, err);
                self.compile_failed(pc);
            }
        }
    }

    fn compile_failed(&mut self, pc: u64) {
        self.stats.compile_failures += 1;
        self.blocks.insert(pc, BlockState::Interpreting { hits: 0, pinned: true });
    }

    /// Words of the block at `start`: up to the first block-ending instruction or the length
    /// limit; a fetch fault after the first word ends the block early
    fn fetch_block(&mut self, start: u64) -> Result<Vec<u32>, MemFault> {
        let mut words = Vec::new();
        for i in 0..self.options.max_block_len {
            let pc = start.wrapping_add(4 * i as u64);
            let word = match self.fetch(pc) {
                Ok(word) => word,
                Err(fault) if i == 0 => return Err(fault),
                Err(_) => break,
            };
            words.push(word);
            if decode(word).ends_block() {
                break;
            }
        }
        Ok(words)
    }

    fn fetch(&mut self, pc: u64) -> Result<u32, MemFault> {
        let ctx = self.cpu.access(AccessKind::Fetch);
        self.mem.load(ctx, pc, AccessSize::Long).map(|word| word as u32)
    }

    /// Install finished background compilations of the current epoch
    fn drain_results(&mut self) {
        let Some(worker) = &mut self.worker else {
            return;
        };
        let mut finished = Vec::new();
        while let Ok(done) = worker.results.try_recv() {
            worker.in_flight = worker.in_flight.saturating_sub(1);
            finished.push(done);
        }
        for done in finished {
            self.finish_background(done);
        }
    }

    fn finish_background(&mut self, done: CompileResult) {
        if done.epoch != self.epoch {
            debug!("discarding stale compilation of {:#x}", done.start);
            return;
        }
        if matches!(self.blocks.get(&done.start), Some(BlockState::Compiling)) {
            self.install(done.start, done.result);
        }
    }

    /// Block until every background compilation has arrived and been installed
    pub fn wait_for_compilations(&mut self) {
        let mut finished = Vec::new();
        if let Some(worker) = &mut self.worker {
            while worker.in_flight > 0 {
                match worker.results.recv() {
                    Ok(done) => {
                        worker.in_flight -= 1;
                        finished.push(done);
                    }
                    Err(_) => break,
                }
            }
        }
        for done in finished {
            self.finish_background(done);
        }
    }

    fn run_compiled(&mut self, block: &CompiledBlock) -> Option<RunExit> {
        trace!("running block {:#x}", block.start());
        let exit = block.execute(&mut self.cpu, &mut self.mem, &self.tables.interp);
        self.stats.compiled_runs += 1;
        self.stats.compiled_instructions += exit.retired;
        self.cpu.cycles = self.cpu.cycles.wrapping_add(exit.retired);

        if let Some(trap) = exit.trap {
            return self.raise(trap);
        }
        self.cpu.pc = exit.next_pc;
        if exit.flush {
            self.invalidate_all();
        }
        self.enter_block();
        self.cpu.halted.then_some(RunExit::Halted)
    }

    fn interpret_one(&mut self) -> Option<RunExit> {
        let pc = self.cpu.pc;
        let word = match self.fetch(pc) {
            Ok(word) => word,
            Err(fault) => return self.raise(Trap::from_fault(fault, pc)),
        };
        let insn = decode(word);

        let mut ctx = ExecContext::new(&mut self.cpu, &mut self.mem);
        let flow = match interp::execute(&self.tables.interp, &mut ctx, &insn) {
            Ok(flow) => flow,
            Err(trap) => return self.raise(trap),
        };

        self.stats.interpreted += 1;
        self.cpu.cycles = self.cpu.cycles.wrapping_add(1);
        match flow {
            Flow::Next | Flow::FlushCode => self.cpu.advance_pc(),
            Flow::Jump(target) => self.cpu.set_program_counter(target),
        }
        self.run_len += 1;
        if flow == Flow::FlushCode {
            self.invalidate_all();
        }
        if insn.ends_block() || self.run_len >= self.options.max_block_len {
            self.enter_block();
        }
        self.cpu.halted.then_some(RunExit::Halted)
    }

    /// Surface `trap` or deliver it to its vector
    fn raise(&mut self, trap: Trap) -> Option<RunExit> {
        self.stats.traps += 1;
        if self.options.stop_on_trap {
            debug!("stopping on {}", trap);
            self.cpu.pc = trap.pc;
            self.enter_block();
            return Some(RunExit::Trapped(trap));
        }
        let vector = TrapVectors::new(self.options.trap_vector_base).vector(trap.kind);
        debug!("delivering {} to {:#x}", trap, vector);
        self.cpu.deliver_trap(&trap, vector);
        self.enter_block();
        None
    }
}
