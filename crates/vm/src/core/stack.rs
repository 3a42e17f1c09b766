use std::{collections::VecDeque, fmt::Display};

use alloy::primitives::U256;
use eyre::{bail, OptionExt, Result};

use super::taint::Taint;

/// Maximum number of items on the EVM stack.
pub const STACK_LIMIT: usize = 1024;

/// Records that a value is the outcome of comparing the call's function
/// selector against a constant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SelectorGuard {
    /// The constant the selector was compared against.
    pub selector: [u8; 4],
    /// `true` if a non-zero value means the selector matched, `false` if the
    /// comparison was negated (`ISZERO(EQ(..))`).
    pub matches_when_nonzero: bool,
}

/// The [`StackFrame`] struct represents a single frame on the stack: a value
/// together with the provenance of that value.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct StackFrame {
    /// The value stored in this stack frame.
    pub value: U256,

    /// Which environment inputs the value was derived from.
    pub taint: Taint,

    /// Set when the value is a function-selector comparison.
    pub guard: Option<SelectorGuard>,
}

impl StackFrame {
    /// A frame holding `value` with the given provenance.
    pub fn new(value: U256, taint: Taint) -> Self {
        Self { value, taint, guard: None }
    }

    /// A frame holding an untainted constant.
    pub fn constant(value: U256) -> Self {
        Self::new(value, Taint::NONE)
    }
}

/// The [`Stack`] struct represents the EVM stack.
/// It is a LIFO data structure that holds a VecDeque of [`StackFrame`]s;
/// the front of the deque is the top of the stack.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct Stack {
    /// The collection of stack frames in LIFO order.
    pub stack: VecDeque<StackFrame>,
}

impl Stack {
    /// Creates a new [`Stack`].
    ///
    /// ```
    /// use argus_vm::core::stack::Stack;
    ///
    /// let stack = Stack::new();
    /// assert_eq!(stack.size(), 0);
    /// ```
    pub fn new() -> Stack {
        Stack { stack: VecDeque::with_capacity(64) }
    }

    /// Push a frame onto the stack.
    ///
    /// ```
    /// use argus_vm::core::stack::{Stack, StackFrame};
    /// use alloy::primitives::U256;
    ///
    /// let mut stack = Stack::new();
    /// stack.push(StackFrame::constant(U256::from(0x00))).expect("room on the stack");
    /// assert_eq!(stack.size(), 1);
    /// ```
    pub fn push(&mut self, frame: StackFrame) -> Result<()> {
        if self.stack.len() >= STACK_LIMIT {
            bail!("stack overflow");
        }
        self.stack.push_front(frame);
        Ok(())
    }

    /// Pop a value off the stack.
    ///
    /// ```
    /// use argus_vm::core::stack::{Stack, StackFrame};
    /// use alloy::primitives::U256;
    ///
    /// let mut stack = Stack::new();
    /// stack.push(StackFrame::constant(U256::from(0x01))).expect("room on the stack");
    ///
    /// assert_eq!(stack.pop().expect("non-empty").value, U256::from(0x01));
    /// assert!(stack.pop().is_err());
    /// ```
    pub fn pop(&mut self) -> Result<StackFrame> {
        self.stack.pop_front().ok_or_eyre("stack underflow")
    }

    /// Pop n values off the stack, topmost first.
    ///
    /// ```
    /// use argus_vm::core::stack::{Stack, StackFrame};
    /// use alloy::primitives::U256;
    ///
    /// let mut stack = Stack::new();
    /// for i in 0..3u8 {
    ///     stack.push(StackFrame::constant(U256::from(i))).expect("room on the stack");
    /// }
    ///
    /// // stack is now [0x02, 0x01, 0x00]
    /// let frames = stack.pop_n(2).expect("enough items");
    /// assert_eq!(frames[0].value, U256::from(0x02));
    /// assert_eq!(frames[1].value, U256::from(0x01));
    /// assert_eq!(stack.size(), 1);
    /// ```
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<StackFrame>> {
        if self.stack.len() < n {
            bail!("stack underflow");
        }
        Ok(self.stack.drain(0..n).collect::<Vec<StackFrame>>())
    }

    /// Swap the top value and the nth value on the stack.
    ///
    /// ```
    /// use argus_vm::core::stack::{Stack, StackFrame};
    /// use alloy::primitives::U256;
    ///
    /// let mut stack = Stack::new();
    /// stack.push(StackFrame::constant(U256::from(0x00))).expect("room on the stack");
    /// stack.push(StackFrame::constant(U256::from(0x01))).expect("room on the stack");
    ///
    /// stack.swap(1).expect("deep enough");
    /// assert_eq!(stack.pop().expect("non-empty").value, U256::from(0x00));
    /// ```
    pub fn swap(&mut self, n: usize) -> Result<()> {
        if n >= self.stack.len() {
            bail!("stack underflow");
        }
        self.stack.swap(0, n);
        Ok(())
    }

    /// Duplicate the nth value on the stack (1-based).
    ///
    /// ```
    /// use argus_vm::core::stack::{Stack, StackFrame};
    /// use alloy::primitives::U256;
    ///
    /// let mut stack = Stack::new();
    /// stack.push(StackFrame::constant(U256::from(0x07))).expect("room on the stack");
    /// stack.dup(1).expect("deep enough");
    /// assert_eq!(stack.size(), 2);
    /// ```
    pub fn dup(&mut self, n: usize) -> Result<()> {
        let frame = n
            .checked_sub(1)
            .and_then(|i| self.stack.get(i))
            .cloned()
            .ok_or_eyre("stack underflow")?;
        self.push(frame)
    }

    /// Peek at the value `index` items below the top.
    pub fn peek(&self, index: usize) -> Option<&StackFrame> {
        self.stack.get(index)
    }

    /// Gets the number of values on the stack.
    pub fn size(&self) -> usize {
        self.stack.len()
    }

    /// Check if the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// The values on the stack, topmost first.
    pub fn values(&self) -> Vec<U256> {
        self.stack.iter().map(|frame| frame.value).collect()
    }
}

impl Display for Stack {
    /// Renders the stack topmost first, e.g. `[0x4, 0x80]`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values =
            self.stack.iter().map(|frame| format!("{:#x}", frame.value)).collect::<Vec<_>>();
        write!(f, "[{}]", values.join(", "))
    }
}
