use std::fmt::{self, Display};

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::core::vm::{ExitReason, VM};

/// Upper bound on the number of instructions a single trace executes.
pub const MAX_TRACE_STEPS: usize = 100_000;

/// One executed instruction together with the stack it ran against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceLine {
    /// Offset of the instruction.
    pub pc: usize,
    /// Mnemonic, e.g. `PUSH1`.
    pub mnemonic: &'static str,
    /// Immediate value of a PUSH.
    pub argument: Option<U256>,
    /// Stack values before the instruction ran, topmost first.
    pub stack: Vec<U256>,
}

impl Display for TraceLine {
    /// `pc MNEMONIC [0xarg] [stack]`, e.g. `2 PUSH1 0x40 [0x80]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pc, self.mnemonic)?;
        if let Some(argument) = self.argument {
            write!(f, " {argument:#x}")?;
        }
        let stack = self.stack.iter().map(|value| format!("{value:#x}")).collect::<Vec<_>>();
        write!(f, " [{}]", stack.join(", "))
    }
}

/// The result of [`trace`].
#[derive(Clone, Debug)]
pub struct Trace {
    /// Every executed instruction, in order.
    pub lines: Vec<TraceLine>,
    /// Why execution stopped.
    pub exit: ExitReason,
}

impl Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Execute `code` at `address` with the given call data, recording every instruction.
///
/// ```
/// use argus_vm::ext::trace::trace;
/// use alloy::primitives::Address;
///
/// // PUSH1 0x80, PUSH1 0x40, MSTORE
/// let trace = trace(&[0x60, 0x80, 0x60, 0x40, 0x52], &[], Address::ZERO);
/// assert_eq!(trace.lines[1].to_string(), "2 PUSH1 0x40 [0x80]");
/// ```
pub fn trace(code: &[u8], calldata: &[u8], address: Address) -> Trace {
    let start_time = std::time::Instant::now();
    let mut vm = VM::new(code, calldata, address);
    let mut lines = Vec::new();

    while !vm.halted() {
        if vm.steps >= MAX_TRACE_STEPS {
            vm.halt(ExitReason::StepLimit, Vec::new());
            break;
        }

        // running off the end of the code is an implicit STOP, not an instruction
        if vm.pc < vm.code.len() {
            let instruction = vm.current_instruction();
            lines.push(TraceLine {
                pc: instruction.pc,
                mnemonic: instruction.name(),
                argument: instruction.push_value(),
                stack: vm.stack.values(),
            });
        }

        if let Err(e) = vm.step() {
            debug!("trace halted at pc {}: {}", vm.pc, e);
        }
    }

    debug!("traced {} instructions in {:?}", lines.len(), start_time.elapsed());
    Trace { lines, exit: vm.exit.unwrap_or(ExitReason::Stop) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_lines() {
        // PUSH1 0x01, PUSH1 0x02, ADD, STOP
        let trace = trace(&[0x60, 0x01, 0x60, 0x02, 0x01, 0x00], &[], Address::ZERO);
        let rendered = trace.lines.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(
            rendered,
            vec!["0 PUSH1 0x1 []", "2 PUSH1 0x2 [0x1]", "4 ADD [0x2, 0x1]", "5 STOP [0x3]"]
        );
        assert_eq!(trace.exit, ExitReason::Stop);
    }

    #[test]
    fn test_trace_uses_calldata() {
        // PUSH0 CALLDATALOAD
        let trace = trace(&[0x5f, 0x35], &[0xff], Address::ZERO);
        assert_eq!(trace.lines.len(), 2);
        assert_eq!(trace.exit, ExitReason::Stop);
    }

    #[test]
    fn test_trace_stops_on_error() {
        // ADD on an empty stack
        let trace = trace(&[0x01, 0x00], &[], Address::ZERO);
        assert_eq!(trace.lines.len(), 1);
        assert!(matches!(trace.exit, ExitReason::Error(_)));
    }

    #[test]
    fn test_trace_stops_on_oversized_copy() {
        // PUSH8 0xff..ff, PUSH0, PUSH0, CALLDATACOPY, STOP
        let mut code = vec![0x67];
        code.extend([0xff; 8]);
        code.extend([0x5f, 0x5f, 0x37, 0x00]);

        let trace = trace(&code, &[], Address::ZERO);
        assert_eq!(trace.lines.len(), 4);
        assert_eq!(trace.lines[3].mnemonic, "CALLDATACOPY");
        assert!(matches!(trace.exit, ExitReason::Error(_)));
    }

    #[test]
    fn test_trace_bounded() {
        // JUMPDEST PUSH0 JUMP
        let trace = trace(&[0x5b, 0x5f, 0x56], &[], Address::ZERO);
        assert_eq!(trace.lines.len(), MAX_TRACE_STEPS);
        assert_eq!(trace.exit, ExitReason::StepLimit);
    }
}
