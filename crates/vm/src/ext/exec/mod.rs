mod blocks;
mod jump_frame;
mod loader;

use std::{collections::BTreeMap, time::Instant};

use alloy::primitives::{Address, U256};
use eyre::Result;
use hashbrown::{HashMap, HashSet};
use petgraph::graph::{Graph, NodeIndex};
use tracing::{debug, trace, warn};

use crate::{
    core::{
        code::{Code, Instruction},
        opcodes::{is_call, CALL, CALLCODE, JUMP, JUMPI, SELFDESTRUCT, SSTORE},
        stack::{Stack, StackFrame},
        taint::Taint,
        vm::VM,
    },
    ext::exec::{blocks::basic_blocks, jump_frame::JumpFrame},
};

pub use loader::{ConnectorLoader, DynLoader};

/// Default bound on the number of data-dependent branches along one path.
pub const DEFAULT_MAX_DEPTH: usize = 22;

/// Total instructions executed across all paths before exploration gives up.
pub const STEP_BUDGET: usize = 500_000;

/// Instructions a single path may execute between branches.
const MAX_PATH_STEPS: usize = 20_000;

/// How often one side of a branch is revisited within a function before the
/// path is considered a loop.
const MAX_FRAME_VISITS: usize = 8;

/// A contract handed to the explorer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractCode {
    /// Display name, e.g. `MAIN` or the compiled unit name.
    pub name: String,
    /// Address the contract is executed at.
    pub address: Address,
    /// Runtime bytecode.
    pub code: Vec<u8>,
}

/// A basic block reached during exploration.
#[derive(Clone, Debug)]
pub struct BlockNode {
    /// Name of the contract the block belongs to.
    pub contract: String,
    /// Address of the contract the block belongs to.
    pub address: Address,
    /// Offset of the first instruction.
    pub start: usize,
    /// The instructions of the block.
    pub instructions: Vec<Instruction>,
    /// Selector of the function the block was first reached through.
    pub function: Option<[u8; 4]>,
}

/// How control moved from one block to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Unconditional JUMP.
    Jump,
    /// JUMPI; `true` for the taken side.
    Conditional(bool),
    /// Execution continued into the next block.
    Fallthrough,
    /// External call into another explored contract.
    Call,
}

/// Something security-relevant observed on an explored path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A message call. `value` is `None` for DELEGATECALL and STATICCALL.
    Call { opcode: u8, target: StackFrame, value: Option<StackFrame> },
    /// SELFDESTRUCT with the given beneficiary.
    SelfDestruct { beneficiary: StackFrame },
    /// A data-dependent conditional jump.
    Branch { condition: Taint },
    /// A write to persistent storage.
    StorageWrite { key: Taint, value: Taint },
}

/// An [`EventKind`] with the context it was observed in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Event {
    /// Name of the contract.
    pub contract: String,
    /// Address of the contract.
    pub address: Address,
    /// Offset of the instruction.
    pub pc: usize,
    /// Selector of the function the path went through, if any.
    pub function: Option<[u8; 4]>,
    /// Combined provenance of every branch condition the path passed.
    pub guards: Taint,
    /// What happened.
    pub kind: EventKind,
}

/// The explored state space: a graph of basic blocks and the events observed.
#[derive(Debug, Default)]
pub struct StateSpace {
    /// Basic blocks connected by control-flow edges.
    pub graph: Graph<BlockNode, EdgeKind>,
    /// Events in the order they were first observed.
    pub events: Vec<Event>,
    /// Every contract that was explored, including dynamically loaded ones.
    pub contracts: Vec<ContractCode>,
    /// Total instructions executed.
    pub steps: usize,
    /// Whether the step budget ran out before every path finished.
    pub truncated: bool,
}

impl StateSpace {
    /// The node of the block at `start` in the contract at `address`.
    pub fn block(&self, address: Address, start: usize) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|i| self.graph[*i].address == address && self.graph[*i].start == start)
    }

    /// Events of a single contract.
    pub fn events_of(&self, address: Address) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |event| event.address == address)
    }
}

/// One path through a contract, waiting to be run.
#[derive(Debug)]
struct Path {
    vm: VM,
    contract: usize,
    block: NodeIndex,
    function: Option<[u8; 4]>,
    guards: Taint,
    depth: usize,
}

/// Per-contract data that does not change during exploration.
#[derive(Debug)]
struct Analyzed {
    contract: ContractCode,
    blocks: BTreeMap<usize, Vec<Instruction>>,
}

/// Builds a [`StateSpace`] by running every contract along all of its branches.
///
/// Call data, storage and environment inputs are concrete, so both sides of every
/// conditional jump are explored regardless of its condition. Branches on the
/// function selector do not count towards `max_depth`.
#[derive(Debug)]
pub struct StateSpaceBuilder<'a> {
    max_depth: usize,
    loader: Option<&'a dyn DynLoader>,
    step_budget: usize,
}

impl Default for StateSpaceBuilder<'_> {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH, loader: None, step_budget: STEP_BUDGET }
    }
}

/// Mutable state shared by all paths of one exploration.
#[derive(Debug, Default)]
struct Explorer {
    space: StateSpace,
    contracts: Vec<Analyzed>,
    nodes: HashMap<(usize, usize), NodeIndex>,
    edges: HashSet<(NodeIndex, NodeIndex, EdgeKind)>,
    events: HashSet<Event>,
    handled_jumps: HashMap<JumpFrame, Vec<Stack>>,
    attempted_loads: HashSet<Address>,
    worklist: Vec<Path>,
}

impl<'a> StateSpaceBuilder<'a> {
    /// A builder with the default depth and no dynamic loading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of data-dependent branches along one path.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve unknown call targets through `loader`.
    pub fn loader(mut self, loader: &'a dyn DynLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Override [`STEP_BUDGET`].
    pub fn step_budget(mut self, step_budget: usize) -> Self {
        self.step_budget = step_budget;
        self
    }

    /// Explore `contracts`, starting each from offset 0 with empty call data.
    pub async fn build(&self, contracts: &[ContractCode]) -> Result<StateSpace> {
        let start_time = Instant::now();
        let mut explorer = Explorer::default();

        for contract in contracts {
            let index = explorer.add_contract(contract.clone());
            explorer.start_path(index, 0);
        }

        while let Some(mut path) = explorer.worklist.pop() {
            if explorer.space.steps >= self.step_budget {
                warn!(
                    "step budget of {} exhausted, {} paths left unexplored",
                    self.step_budget,
                    explorer.worklist.len() + 1
                );
                explorer.space.truncated = true;
                break;
            }

            let loads = explorer.run_path(&mut path, self.max_depth, self.step_budget);
            for (target, from_block, depth) in loads {
                self.load_contract(&mut explorer, target, from_block, depth).await;
            }
        }

        let space = explorer.space;
        debug!(
            "explored {} blocks and {} events across {} contracts in {:?}",
            space.graph.node_count(),
            space.events.len(),
            space.contracts.len(),
            start_time.elapsed()
        );
        Ok(space)
    }

    async fn load_contract(
        &self,
        explorer: &mut Explorer,
        target: Address,
        from_block: NodeIndex,
        depth: usize,
    ) {
        let Some(loader) = self.loader else { return };
        if depth > self.max_depth || !explorer.attempted_loads.insert(target) {
            return;
        }

        match loader.load(target).await {
            Ok(Some(code)) => {
                debug!("dynamically loaded {} bytes of code for {}", code.len(), target);
                let index = explorer.add_contract(ContractCode {
                    name: target.to_string(),
                    address: target,
                    code,
                });
                if let Some(entry) = explorer.start_path(index, depth) {
                    explorer.add_edge(from_block, entry, EdgeKind::Call);
                }
            }
            Ok(None) => trace!("no code at call target {}", target),
            Err(e) => warn!("failed to load code for {}: {}", target, e),
        }
    }
}

impl Explorer {
    fn add_contract(&mut self, contract: ContractCode) -> usize {
        let blocks = basic_blocks(&Code::new(contract.code.clone()));
        self.space.contracts.push(contract.clone());
        self.contracts.push(Analyzed { contract, blocks });
        self.contracts.len() - 1
    }

    fn contract_index(&self, address: Address) -> Option<usize> {
        self.contracts.iter().position(|c| c.contract.address == address)
    }

    fn start_path(&mut self, contract: usize, depth: usize) -> Option<NodeIndex> {
        let analyzed = &self.contracts[contract];
        if analyzed.contract.code.is_empty() {
            return None;
        }

        let vm = VM::new(&analyzed.contract.code, &[], analyzed.contract.address);
        let block = self.node(contract, 0, None)?;
        let guards = Taint::NONE;
        self.worklist.push(Path { vm, contract, block, function: None, guards, depth });
        Some(block)
    }

    /// The node for the block starting at `start`, created on first use.
    fn node(
        &mut self,
        contract: usize,
        start: usize,
        function: Option<[u8; 4]>,
    ) -> Option<NodeIndex> {
        if let Some(index) = self.nodes.get(&(contract, start)) {
            return Some(*index);
        }

        let analyzed = &self.contracts[contract];
        let instructions = analyzed.blocks.get(&start)?.clone();
        let index = self.space.graph.add_node(BlockNode {
            contract: analyzed.contract.name.clone(),
            address: analyzed.contract.address,
            start,
            instructions,
            function,
        });
        self.nodes.insert((contract, start), index);
        Some(index)
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) {
        if self.edges.insert((from, to, kind)) {
            self.space.graph.add_edge(from, to, kind);
        }
    }

    fn record(&mut self, path: &Path, pc: usize, kind: EventKind) {
        let event = Event {
            contract: self.contracts[path.contract].contract.name.clone(),
            address: self.contracts[path.contract].contract.address,
            pc,
            function: path.function,
            guards: path.guards,
            kind,
        };
        if self.events.insert(event.clone()) {
            self.space.events.push(event);
        }
    }

    /// Whether the branch side described by `frame` should be explored with `stack`.
    fn should_explore(&mut self, frame: JumpFrame, stack: &Stack) -> bool {
        let history = self.handled_jumps.entry(frame).or_default();
        if history.contains(stack) || history.len() >= MAX_FRAME_VISITS {
            return false;
        }
        history.push(stack.clone());
        true
    }

    /// Run `path` until it halts or forks. Returns external call targets that
    /// should be loaded, with the block they were called from and the depth.
    fn run_path(
        &mut self,
        path: &mut Path,
        max_depth: usize,
        step_budget: usize,
    ) -> Vec<(Address, NodeIndex, usize)> {
        let mut loads = Vec::new();
        let address = self.contracts[path.contract].contract.address;
        let mut path_steps = 0;

        while !path.vm.halted() {
            if self.space.steps >= step_budget || path_steps >= MAX_PATH_STEPS {
                trace!("path in {} stopped after {} steps", address, path_steps);
                self.space.truncated |= self.space.steps >= step_budget;
                break;
            }

            let instruction = path.vm.current_instruction();
            if path.vm.pc < path.vm.code.len() && instruction.opcode == JUMPI {
                self.space.steps += 1;
                self.fork(path, &instruction, max_depth);
                return loads;
            }

            self.observe(path, &instruction, &mut loads);

            self.space.steps += 1;
            path_steps += 1;
            if let Err(e) = path.vm.step() {
                trace!("path in {} halted at pc {}: {}", address, instruction.pc, e);
                break;
            }

            if path.vm.halted() {
                break;
            }

            let next = path.vm.pc;
            if self.contracts[path.contract].blocks.contains_key(&next) && next != instruction.pc {
                let kind =
                    if instruction.opcode == JUMP { EdgeKind::Jump } else { EdgeKind::Fallthrough };
                if let Some(node) = self.node(path.contract, next, path.function) {
                    self.add_edge(path.block, node, kind);
                    path.block = node;
                }
            }
        }

        loads
    }

    /// Record the events of `instruction` before it runs, and collect call targets.
    fn observe(
        &mut self,
        path: &Path,
        instruction: &Instruction,
        loads: &mut Vec<(Address, NodeIndex, usize)>,
    ) {
        let stack = &path.vm.stack;
        let frame = |i: usize| stack.peek(i).cloned().unwrap_or_default();

        match instruction.opcode {
            opcode if is_call(opcode) && stack.size() >= 2 => {
                let target = frame(1);
                let value = matches!(opcode, CALL | CALLCODE).then(|| frame(2));

                if target.taint.is_empty() {
                    let bytes = target.value.to_be_bytes::<32>();
                    let callee = Address::from_slice(&bytes[12..]);
                    match self.contract_index(callee) {
                        Some(known) if known != path.contract => {
                            if let Some(entry) = self.node(known, 0, None) {
                                self.add_edge(path.block, entry, EdgeKind::Call);
                            }
                        }
                        Some(_) => {}
                        None if target.value > U256::from(0xffu8) => {
                            loads.push((callee, path.block, path.depth + 1))
                        }
                        // precompiles
                        None => {}
                    }
                }

                self.record(path, instruction.pc, EventKind::Call { opcode, target, value });
            }
            SELFDESTRUCT if !stack.is_empty() => {
                let beneficiary = frame(0);
                self.record(path, instruction.pc, EventKind::SelfDestruct { beneficiary });
            }
            SSTORE if stack.size() >= 2 => {
                let (key, value) = (frame(0).taint, frame(1).taint);
                self.record(path, instruction.pc, EventKind::StorageWrite { key, value });
            }
            _ => {}
        }
    }

    /// Execute the JUMPI at the head of `path`, queueing both sides.
    fn fork(&mut self, path: &mut Path, instruction: &Instruction, max_depth: usize) {
        let Ok(inputs) = path.vm.stack.pop_n(2) else {
            trace!("stack underflow at JUMPI {}", instruction.pc);
            return;
        };
        let (dest, condition) = (&inputs[0], &inputs[1]);
        let address = self.contracts[path.contract].contract.address;

        let (mut taken_function, mut fallthrough_function) = (path.function, path.function);
        let mut depth = path.depth;
        let mut guards = path.guards;

        match condition.guard {
            Some(guard) if guard.matches_when_nonzero => taken_function = Some(guard.selector),
            Some(guard) => fallthrough_function = Some(guard.selector),
            None => {
                if !condition.taint.is_empty() {
                    let branch = EventKind::Branch { condition: condition.taint };
                    self.record(path, instruction.pc, branch);
                    depth += 1;
                }
                guards |= condition.taint;
            }
        }

        if depth > max_depth {
            trace!("max depth reached at JUMPI {} in {}", instruction.pc, address);
            return;
        }

        for (taken, function) in [(true, taken_function), (false, fallthrough_function)] {
            let mut vm = path.vm.clone();
            vm.steps += 1;
            if taken {
                if vm.jump(dest.value).is_err() {
                    trace!("invalid jump destination {:#x} at {}", dest.value, instruction.pc);
                    continue;
                }
            } else {
                vm.pc = instruction.next_pc();
            }

            let frame = JumpFrame::new(address, instruction.pc, function, taken);
            if !self.should_explore(frame, &vm.stack) {
                trace!("skipping revisited branch at {} (taken: {})", instruction.pc, taken);
                continue;
            }

            let Some(node) = self.node(path.contract, vm.pc, function) else {
                continue;
            };
            self.add_edge(path.block, node, EdgeKind::Conditional(taken));
            self.worklist.push(Path {
                vm,
                contract: path.contract,
                block: node,
                function,
                guards,
                depth,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_common::utils::strings::decode_hex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn contract(hex: &str) -> ContractCode {
        ContractCode {
            name: "MAIN".to_string(),
            address: Address::repeat_byte(0x00),
            code: decode_hex(hex).expect("valid hex"),
        }
    }

    // selector dispatch for 0xa9059cbb, the function body self-destructs to the caller:
    // 00 PUSH0 CALLDATALOAD PUSH1 0xe0 SHR
    // 05 PUSH4 0xa9059cbb EQ PUSH1 0x11 JUMPI
    // 0e PUSH0 PUSH0 REVERT
    // 11 JUMPDEST CALLER SELFDESTRUCT
    const DISPATCH: &str = "0x5f3560e01c63a9059cbb14601157 5f5ffd 5b33ff";

    #[tokio::test]
    async fn test_selector_branches_label_functions() {
        let space = StateSpaceBuilder::new()
            .build(&[contract(&DISPATCH.replace(' ', ""))])
            .await
            .expect("exploration succeeds");

        let selfdestruct = space
            .events
            .iter()
            .find(|e| matches!(e.kind, EventKind::SelfDestruct { .. }))
            .expect("selfdestruct reached");
        assert_eq!(selfdestruct.function, Some([0xa9, 0x05, 0x9c, 0xbb]));
        assert_eq!(selfdestruct.pc, 0x13);
        assert!(selfdestruct.guards.is_empty());

        assert_eq!(space.graph.node_count(), 3);
        assert_eq!(space.graph.edge_count(), 2);
        assert!(space.block(Address::ZERO, 0x11).is_some());
        assert!(!space.truncated);
    }

    #[tokio::test]
    async fn test_guards_accumulate() {
        // 00 CALLER PUSH1 0x01 SLOAD EQ PUSH1 0x0a JUMPI
        // 08 PUSH0 SELFDESTRUCT
        // 0a JUMPDEST ORIGIN SELFDESTRUCT
        let space = StateSpaceBuilder::new()
            .build(&[contract("0x3360015414600a57 5fff 5b32ff".replace(' ', "").as_str())])
            .await
            .expect("exploration succeeds");

        let guarded = space
            .events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::SelfDestruct { .. }))
            .collect::<Vec<_>>();
        assert_eq!(guarded.len(), 2);
        assert!(guarded.iter().all(|e| e.guards.contains(Taint::CALLER | Taint::STORAGE)));
        assert!(space.events.iter().any(|e| match e.kind {
            EventKind::Branch { condition } => condition.contains(Taint::CALLER),
            _ => false,
        }));
    }

    #[tokio::test]
    async fn test_loops_terminate() {
        // 00 JUMPDEST CALLDATASIZE PUSH0 JUMPI -> loops forever on one side
        let space = StateSpaceBuilder::new()
            .build(&[contract("0x5b365f57")])
            .await
            .expect("exploration succeeds");
        assert!(space.steps < STEP_BUDGET);
        assert!(!space.truncated);
    }

    #[tokio::test]
    async fn test_max_depth_bounds_paths() {
        // ten sequential calldata-dependent branches, both sides land on the next JUMPDEST
        let mut code = Vec::new();
        for _ in 0..10 {
            let next = (code.len() + 4) as u8;
            code.extend_from_slice(&[0x36, 0x60, next, 0x57, 0x5b]);
        }
        code.push(0xff);

        let space = StateSpaceBuilder::new()
            .max_depth(3)
            .build(&[ContractCode { name: "MAIN".into(), address: Address::ZERO, code }])
            .await
            .expect("exploration succeeds");
        let branches =
            space.events.iter().filter(|e| matches!(e.kind, EventKind::Branch { .. })).count();
        assert!(branches <= 4);
        assert!(!space.events.iter().any(|e| matches!(e.kind, EventKind::SelfDestruct { .. })));
    }

    #[derive(Debug, Default)]
    struct CountingLoader {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl DynLoader for CountingLoader {
        async fn load(&self, _address: Address) -> Result<Option<Vec<u8>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // CALLER SELFDESTRUCT
            Ok(Some(vec![0x33, 0xff]))
        }
    }

    #[tokio::test]
    async fn test_dynamic_loading() {
        // PUSH0 x4, PUSH0 (value), PUSH20 target, GAS, CALL, STOP
        let target = "1234567890123456789012345678901234567890";
        let hex = format!("0x5f5f5f5f5f73{target}5af100");

        let loader = CountingLoader::default();
        let space = StateSpaceBuilder::new()
            .loader(&loader)
            .build(&[contract(&hex)])
            .await
            .expect("exploration succeeds");

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(space.contracts.len(), 2);
        assert!(space
            .graph
            .edge_indices()
            .any(|e| space.graph[e] == EdgeKind::Call));
        assert!(space
            .events
            .iter()
            .any(|e| {
                matches!(e.kind, EventKind::SelfDestruct { .. }) && e.address != Address::ZERO
            }));

        // without a loader the target is never explored
        let space =
            StateSpaceBuilder::new().build(&[contract(&hex)]).await.expect("exploration succeeds");
        assert_eq!(space.contracts.len(), 1);
    }
}
