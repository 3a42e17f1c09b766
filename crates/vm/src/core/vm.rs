use std::fmt::{self, Display};

use alloy::primitives::{keccak256, Address, I256, U256};
use eyre::{bail, eyre, Result};

use super::{
    code::{Code, Instruction},
    constants::{
        COINBASE_ADDRESS, CREATE_ADDRESS, DEFAULT_BLOCK_NUMBER, DEFAULT_CALLER, DEFAULT_CHAIN_ID,
        DEFAULT_GAS, DEFAULT_TIMESTAMP,
    },
    memory::Memory,
    opcodes::*,
    stack::{SelectorGuard, Stack, StackFrame},
    storage::Storage,
    taint::Taint,
};

/// Why execution stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// STOP, or running off the end of the code.
    Stop,
    /// RETURN
    Return,
    /// REVERT
    Revert,
    /// INVALID or an undefined opcode.
    Invalid(u8),
    /// SELFDESTRUCT
    SelfDestruct,
    /// The step limit was reached before the code halted.
    StepLimit,
    /// Stack underflow, bad jump, memory limit, ...
    Error(String),
}

impl ExitReason {
    /// Whether the state changes of the execution would persist.
    pub fn is_success(&self) -> bool {
        matches!(self, ExitReason::Stop | ExitReason::Return | ExitReason::SelfDestruct)
    }
}

impl Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Stop => write!(f, "STOP"),
            ExitReason::Return => write!(f, "RETURN"),
            ExitReason::Revert => write!(f, "REVERT"),
            ExitReason::Invalid(opcode) => write!(f, "INVALID (0x{opcode:02x})"),
            ExitReason::SelfDestruct => write!(f, "SELFDESTRUCT"),
            ExitReason::StepLimit => write!(f, "step limit reached"),
            ExitReason::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// A record of one executed instruction, returned by [`VM::step`].
#[derive(Clone, Debug)]
pub struct Step {
    /// The instruction that was executed.
    pub instruction: Instruction,
    /// The stack items the instruction consumed, topmost first.
    pub inputs: Vec<StackFrame>,
    /// The item the instruction produced, if any.
    pub output: Option<StackFrame>,
}

/// [`ExecutionResult`] is the result of running a VM until it halts.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// Why execution stopped.
    pub exit: ExitReason,
    /// Data passed to RETURN or REVERT.
    pub returndata: Vec<u8>,
    /// Number of instructions executed.
    pub steps: usize,
}

/// The [`VM`] struct represents a concrete EVM instance over a single contract.
/// Environment inputs (caller, call data, block metadata) are fixed values, and
/// every value on the stack, in memory and in storage carries a [`Taint`]
/// recording which of those inputs it was derived from. External calls are not
/// executed: they succeed immediately with empty return data.
#[derive(Clone, Debug)]
pub struct VM {
    /// The EVM stack that holds values during execution.
    pub stack: Stack,

    /// The EVM memory space that can be read from and written to.
    pub memory: Memory,

    /// The contract's persistent and transient storage.
    pub storage: Storage,

    /// The program counter.
    pub pc: usize,

    /// The code being executed.
    pub code: Code,

    /// The input data provided to the contract call.
    pub calldata: Vec<u8>,

    /// The address of the executing contract.
    pub address: Address,

    /// The address that originated the transaction.
    pub origin: Address,

    /// The address that directly called this contract.
    pub caller: Address,

    /// The amount of ether sent with the call (in wei).
    pub value: U256,

    /// Return data of the last call, or of the execution once halted.
    pub returndata: Vec<u8>,

    /// Set once execution has halted.
    pub exit: Option<ExitReason>,

    /// Number of instructions executed.
    pub steps: usize,
}

fn bool_word(condition: bool) -> U256 {
    if condition {
        U256::from(1u8)
    } else {
        U256::ZERO
    }
}

fn address_word(address: Address) -> U256 {
    U256::from_be_slice(address.as_slice())
}

/// Convert a word to an offset or size, failing for values that cannot be addressed.
fn as_usize(value: U256) -> Result<usize> {
    if value.bit_len() > 64 {
        bail!("value {value:#x} does not fit in an offset");
    }
    usize::try_from(value.as_limbs()[0])
        .map_err(|_| eyre!("value {value:#x} does not fit in an offset"))
}

/// Offset and size of a memory range; a zero size never touches memory, whatever the offset.
fn memory_range(offset: &StackFrame, size: &StackFrame) -> Result<(usize, usize)> {
    let size = as_usize(size.value)?;
    if size == 0 {
        return Ok((0, 0));
    }
    Ok((as_usize(offset.value)?, size))
}

/// A 4-byte constant a selector can be compared against.
fn selector_constant(frame: &StackFrame) -> Option<[u8; 4]> {
    if !frame.taint.is_empty() || frame.value.bit_len() > 32 || frame.value.is_zero() {
        return None;
    }
    let bytes = frame.value.to_be_bytes::<32>();
    Some([bytes[28], bytes[29], bytes[30], bytes[31]])
}

impl VM {
    /// Creates a new [`VM`] running `bytecode` at `address` with the given call data.
    /// Caller and origin default to [`DEFAULT_CALLER`], value to zero.
    ///
    /// ```
    /// use argus_vm::core::vm::VM;
    /// use alloy::primitives::Address;
    ///
    /// // PUSH1 0x01, PUSH1 0x02, ADD, STOP
    /// let mut vm = VM::new(&[0x60, 0x01, 0x60, 0x02, 0x01, 0x00], &[], Address::ZERO);
    /// let result = vm.execute(100);
    /// assert!(result.exit.is_success());
    /// assert_eq!(vm.stack.values(), vec![alloy::primitives::U256::from(3)]);
    /// ```
    pub fn new(bytecode: &[u8], calldata: &[u8], address: Address) -> VM {
        VM {
            stack: Stack::new(),
            memory: Memory::new(),
            storage: Storage::new(),
            pc: 0,
            code: Code::new(bytecode.to_vec()),
            calldata: calldata.to_vec(),
            address,
            origin: DEFAULT_CALLER,
            caller: DEFAULT_CALLER,
            value: U256::ZERO,
            returndata: Vec::new(),
            exit: None,
            steps: 0,
        }
    }

    /// Set the value sent with the call.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Set `msg.sender`.
    pub fn with_caller(mut self, caller: Address) -> Self {
        self.caller = caller;
        self
    }

    /// Whether execution has halted.
    pub fn halted(&self) -> bool {
        self.exit.is_some()
    }

    /// Halts execution with the given reason and returndata.
    pub fn halt(&mut self, reason: ExitReason, returndata: Vec<u8>) {
        self.exit = Some(reason);
        self.returndata = returndata;
    }

    /// Move the program counter to `dest`, which must be a JUMPDEST.
    pub fn jump(&mut self, dest: U256) -> Result<()> {
        let target = as_usize(dest).ok().filter(|pc| self.code.is_jumpdest(*pc));
        match target {
            Some(pc) => {
                self.pc = pc;
                Ok(())
            }
            None => bail!("invalid jump destination {dest:#x}"),
        }
    }

    /// The instruction at the program counter.
    pub fn current_instruction(&self) -> Instruction {
        self.code.instruction_at(self.pc)
    }

    /// Executes the next instruction. Returns information about the instruction
    /// executed. On failure the VM is halted with [`ExitReason::Error`].
    pub fn step(&mut self) -> Result<Step> {
        if let Some(reason) = &self.exit {
            bail!("execution already halted: {reason}");
        }

        if self.pc >= self.code.len() {
            self.halt(ExitReason::Stop, Vec::new());
            let instruction = self.current_instruction();
            return Ok(Step { instruction, inputs: vec![], output: None });
        }

        let instruction = self.current_instruction();
        let info = OpCodeInfo::from(instruction.opcode);
        let inputs = self.stack.stack.iter().take(info.inputs() as usize).cloned().collect();
        self.steps += 1;

        if let Err(e) = self.execute_instruction(&instruction) {
            self.halt(ExitReason::Error(e.to_string()), Vec::new());
            return Err(e);
        }

        let output = match instruction.opcode {
            DUP1..=DUP16 | SWAP1..=SWAP16 => None,
            _ if info.outputs() > 0 => self.stack.peek(0).cloned(),
            _ => None,
        };

        Ok(Step { instruction, inputs, output })
    }

    /// Run until the code halts or `max_steps` instructions have executed.
    pub fn execute(&mut self, max_steps: usize) -> ExecutionResult {
        while !self.halted() {
            if self.steps >= max_steps {
                self.halt(ExitReason::StepLimit, Vec::new());
                break;
            }
            // errors halt the vm, the reason is kept in `exit`
            let _ = self.step();
        }

        ExecutionResult {
            exit: self.exit.clone().unwrap_or(ExitReason::Stop),
            returndata: self.returndata.clone(),
            steps: self.steps,
        }
    }

    fn pop(&mut self) -> Result<StackFrame> {
        self.stack.pop()
    }

    fn push(&mut self, value: U256, taint: Taint) -> Result<()> {
        self.stack.push(StackFrame::new(value, taint))
    }

    fn binary(&mut self, op: impl FnOnce(U256, U256) -> U256) -> Result<()> {
        let a = self.pop()?;
        let b = self.pop()?;
        self.push(op(a.value, b.value), a.taint | b.taint)
    }

    fn signed_binary(&mut self, op: impl FnOnce(I256, I256) -> I256) -> Result<()> {
        self.binary(|a, b| op(I256::from_raw(a), I256::from_raw(b)).into_raw())
    }

    fn execute_instruction(&mut self, instruction: &Instruction) -> Result<()> {
        let opcode = instruction.opcode;
        let mut next_pc = instruction.next_pc();

        match opcode {
            STOP => self.halt(ExitReason::Stop, Vec::new()),

            ADD => self.binary(|a, b| a.wrapping_add(b))?,
            MUL => self.binary(|a, b| a.wrapping_mul(b))?,
            SUB => self.binary(|a, b| a.wrapping_sub(b))?,
            DIV => self.binary(|a, b| a.checked_div(b).unwrap_or_default())?,
            SDIV => self.signed_binary(|a, b| {
                if b.is_zero() {
                    I256::ZERO
                } else if a == I256::MIN && b == I256::MINUS_ONE {
                    I256::MIN
                } else {
                    a / b
                }
            })?,
            MOD => self.binary(|a, b| a.checked_rem(b).unwrap_or_default())?,
            SMOD => self.signed_binary(|a, b| {
                if b.is_zero() || b == I256::MINUS_ONE {
                    I256::ZERO
                } else {
                    a % b
                }
            })?,
            ADDMOD | MULMOD => {
                let a = self.pop()?;
                let b = self.pop()?;
                let n = self.pop()?;
                let value = match (opcode, n.value.is_zero()) {
                    (_, true) => U256::ZERO,
                    (ADDMOD, false) => a.value.add_mod(b.value, n.value),
                    _ => a.value.mul_mod(b.value, n.value),
                };
                self.push(value, a.taint | b.taint | n.taint)?;
            }
            EXP => self.binary(|a, b| a.wrapping_pow(b))?,
            SIGNEXTEND => self.binary(|b, x| {
                if b >= U256::from(31) {
                    return x;
                }
                let bit = b.as_limbs()[0] as usize * 8 + 7;
                let mask = (U256::from(1) << (bit + 1)).wrapping_sub(U256::from(1));
                if x.bit(bit) {
                    x | !mask
                } else {
                    x & mask
                }
            })?,

            LT => self.binary(|a, b| bool_word(a < b))?,
            GT => self.binary(|a, b| bool_word(a > b))?,
            SLT => self.signed_binary(|a, b| I256::from_raw(bool_word(a < b)))?,
            SGT => self.signed_binary(|a, b| I256::from_raw(bool_word(a > b)))?,
            EQ => {
                let a = self.pop()?;
                let b = self.pop()?;

                // selector dispatch compares calldata against a 4-byte constant
                let guard = match (
                    a.taint.contains(Taint::CALLDATA),
                    b.taint.contains(Taint::CALLDATA),
                ) {
                    (true, false) => selector_constant(&b),
                    (false, true) => selector_constant(&a),
                    _ => None,
                }
                .map(|selector| SelectorGuard { selector, matches_when_nonzero: true });

                self.stack.push(StackFrame {
                    value: bool_word(a.value == b.value),
                    taint: a.taint | b.taint,
                    guard,
                })?;
            }
            ISZERO => {
                let a = self.pop()?;
                self.stack.push(StackFrame {
                    value: bool_word(a.value.is_zero()),
                    taint: a.taint,
                    guard: a.guard.map(|g| SelectorGuard {
                        matches_when_nonzero: !g.matches_when_nonzero,
                        ..g
                    }),
                })?;
            }
            AND => self.binary(|a, b| a & b)?,
            OR => self.binary(|a, b| a | b)?,
            XOR => self.binary(|a, b| a ^ b)?,
            NOT => {
                let a = self.pop()?;
                self.push(!a.value, a.taint)?;
            }
            BYTE => self.binary(|i, x| {
                if i >= U256::from(32) {
                    U256::ZERO
                } else {
                    U256::from(x.byte(31 - i.as_limbs()[0] as usize))
                }
            })?,
            SHL => self.binary(|shift, value| {
                if shift >= U256::from(256) {
                    U256::ZERO
                } else {
                    value << (shift.as_limbs()[0] as usize)
                }
            })?,
            SHR => self.binary(|shift, value| {
                if shift >= U256::from(256) {
                    U256::ZERO
                } else {
                    value >> (shift.as_limbs()[0] as usize)
                }
            })?,
            SAR => self.binary(|shift, value| {
                let value = I256::from_raw(value);
                if shift >= U256::from(256) {
                    if value.is_negative() {
                        I256::MINUS_ONE.into_raw()
                    } else {
                        U256::ZERO
                    }
                } else {
                    value.asr(shift.as_limbs()[0] as usize).into_raw()
                }
            })?,

            SHA3 => {
                let offset = self.pop()?;
                let size = self.pop()?;
                let (start, len) = memory_range(&offset, &size)?;
                let data = self.memory.read(start, len)?;
                let taint = self.memory.taint_of(start, len) | offset.taint | size.taint;
                self.push(U256::from_be_bytes(keccak256(&data).0), taint)?;
            }

            ADDRESS => self.push(address_word(self.address), Taint::NONE)?,
            BALANCE | EXTCODESIZE | EXTCODEHASH => {
                let target = self.pop()?;
                self.push(U256::ZERO, target.taint)?;
            }
            ORIGIN => self.push(address_word(self.origin), Taint::ORIGIN)?,
            CALLER => self.push(address_word(self.caller), Taint::CALLER)?,
            CALLVALUE => self.push(self.value, Taint::CALLVALUE)?,
            CALLDATALOAD => {
                let offset = self.pop()?;
                let mut word = [0u8; 32];
                if let Ok(start) = as_usize(offset.value) {
                    for (i, byte) in word.iter_mut().enumerate() {
                        *byte = start
                            .checked_add(i)
                            .and_then(|at| self.calldata.get(at))
                            .copied()
                            .unwrap_or(0);
                    }
                }
                self.push(U256::from_be_bytes(word), Taint::CALLDATA | offset.taint)?;
            }
            CALLDATASIZE => self.push(U256::from(self.calldata.len()), Taint::CALLDATA)?,
            CALLDATACOPY | CODECOPY | RETURNDATACOPY => {
                let dest = self.pop()?;
                let src = self.pop()?;
                let size = self.pop()?;
                let (dest, len) = memory_range(&dest, &size)?;
                let src = as_usize(src.value).unwrap_or(usize::MAX);
                let (data, taint) = match opcode {
                    CALLDATACOPY => (self.calldata.clone(), Taint::CALLDATA),
                    CODECOPY => (self.code.bytes().to_vec(), Taint::NONE),
                    _ => (self.returndata.clone(), Taint::RETURNDATA),
                };
                self.memory.copy_from(dest, &data, src, len, taint)?;
            }
            CODESIZE => self.push(U256::from(self.code.len()), Taint::NONE)?,
            GASPRICE | BASEFEE | BLOBBASEFEE => self.push(U256::ZERO, Taint::BLOCK)?,
            EXTCODECOPY => {
                let _target = self.pop()?;
                let dest = self.pop()?;
                let _src = self.pop()?;
                let size = self.pop()?;
                let (dest, len) = memory_range(&dest, &size)?;
                self.memory.copy_from(dest, &[], 0, len, Taint::NONE)?;
            }
            RETURNDATASIZE => self.push(U256::from(self.returndata.len()), Taint::RETURNDATA)?,
            BLOCKHASH | BLOBHASH => {
                let _ = self.pop()?;
                self.push(U256::ZERO, Taint::BLOCK)?;
            }
            COINBASE => self.push(address_word(COINBASE_ADDRESS), Taint::BLOCK)?,
            TIMESTAMP => self.push(U256::from(DEFAULT_TIMESTAMP), Taint::TIMESTAMP)?,
            NUMBER => self.push(U256::from(DEFAULT_BLOCK_NUMBER), Taint::NUMBER)?,
            PREVRANDAO => self.push(U256::ZERO, Taint::BLOCK)?,
            GASLIMIT => self.push(DEFAULT_GAS, Taint::BLOCK)?,
            CHAINID => self.push(U256::from(DEFAULT_CHAIN_ID), Taint::NONE)?,
            SELFBALANCE => self.push(U256::ZERO, Taint::NONE)?,

            POP => {
                self.pop()?;
            }
            MLOAD => {
                let offset = self.pop()?;
                let start = as_usize(offset.value)?;
                let word = self.memory.read(start, 32)?;
                let taint = self.memory.taint_of(start, 32) | offset.taint;
                self.push(U256::from_be_slice(&word), taint)?;
            }
            MSTORE => {
                let offset = self.pop()?;
                let value = self.pop()?;
                self.memory.store(
                    as_usize(offset.value)?,
                    &value.value.to_be_bytes::<32>(),
                    value.taint,
                )?;
            }
            MSTORE8 => {
                let offset = self.pop()?;
                let value = self.pop()?;
                self.memory.store(as_usize(offset.value)?, &[value.value.byte(0)], value.taint)?;
            }
            SLOAD | TLOAD => {
                let key = self.pop()?;
                let (value, taint) = match opcode {
                    SLOAD => self.storage.load(key.value),
                    _ => self.storage.tload(key.value),
                };
                self.push(value, taint | key.taint)?;
            }
            SSTORE | TSTORE => {
                let key = self.pop()?;
                let value = self.pop()?;
                match opcode {
                    SSTORE => self.storage.store(key.value, value.value, value.taint),
                    _ => self.storage.tstore(key.value, value.value, value.taint),
                }
            }
            JUMP => {
                let dest = self.pop()?;
                self.jump(dest.value)?;
                next_pc = self.pc;
            }
            JUMPI => {
                let dest = self.pop()?;
                let condition = self.pop()?;
                if !condition.value.is_zero() {
                    self.jump(dest.value)?;
                    next_pc = self.pc;
                }
            }
            PC => self.push(U256::from(instruction.pc), Taint::NONE)?,
            MSIZE => self.push(U256::from(self.memory.size()), Taint::NONE)?,
            GAS => self.push(DEFAULT_GAS, Taint::NONE)?,
            JUMPDEST => {}
            MCOPY => {
                let dest = self.pop()?;
                let src = self.pop()?;
                let size = self.pop()?;
                let (dest, len) = memory_range(&dest, &size)?;
                if len > 0 {
                    let src = as_usize(src.value)?;
                    let data = self.memory.read(src, len)?;
                    let taint = self.memory.taint_of(src, len);
                    self.memory.store(dest, &data, taint)?;
                }
            }

            PUSH0..=PUSH32 => {
                let value = instruction.push_value().unwrap_or_default();
                self.push(value, Taint::NONE)?;
            }
            DUP1..=DUP16 => self.stack.dup((opcode - DUP1 + 1) as usize)?,
            SWAP1..=SWAP16 => self.stack.swap((opcode - SWAP1 + 1) as usize)?,
            LOG0..=LOG4 => {
                self.stack.pop_n(2 + (opcode - LOG0) as usize)?;
            }

            CREATE | CREATE2 => {
                let inputs = self.stack.pop_n(if opcode == CREATE { 3 } else { 4 })?;
                let taint = Taint::union(inputs.iter().map(|frame| frame.taint));
                self.returndata.clear();
                self.push(address_word(CREATE_ADDRESS), taint)?;
            }
            CALL | CALLCODE | DELEGATECALL | STATICCALL => {
                let count = if matches!(opcode, CALL | CALLCODE) { 7 } else { 6 };
                self.stack.pop_n(count)?;
                self.returndata.clear();
                self.push(U256::from(1), Taint::RETURNDATA)?;
            }
            RETURN | REVERT => {
                let offset = self.pop()?;
                let size = self.pop()?;
                let (start, len) = memory_range(&offset, &size)?;
                let data = self.memory.read(start, len)?;
                let reason = if opcode == RETURN { ExitReason::Return } else { ExitReason::Revert };
                self.halt(reason, data);
            }
            SELFDESTRUCT => {
                self.pop()?;
                self.halt(ExitReason::SelfDestruct, Vec::new());
            }
            _ => self.halt(ExitReason::Invalid(opcode), Vec::new()),
        }

        self.pc = next_pc;
        Ok(())
    }
}
