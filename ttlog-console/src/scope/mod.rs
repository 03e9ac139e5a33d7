//! # Ambient Scopes
//!
//! A per-thread stack of scope labels. [`push_scope`] returns a guard that
//! pops the label again when dropped; every event logged on the thread in
//! between carries the label.
//!
//! ```rust
//! use ttlog_console::scope::{current_scopes, push_scope};
//!
//! let _request = push_scope("request 7");
//! {
//!   let _order = push_scope("order 9");
//!   assert_eq!(current_scopes().as_slice(), ["request 7", "order 9"]);
//! }
//! assert_eq!(current_scopes().as_slice(), ["request 7"]);
//! ```


use std::cell::RefCell;
use std::marker::PhantomData;

use crate::event::ScopeStack;

thread_local! {
  static SCOPES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Pops its scope (and anything pushed after it) on drop.
///
/// Not `Send`: the stack it refers to belongs to the creating thread.
#[must_use = "the scope ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard {
  depth: usize,
  _thread_bound: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
  fn drop(&mut self) {
    let _ = SCOPES.try_with(|scopes| {
      if let Ok(mut scopes) = scopes.try_borrow_mut() {
        scopes.truncate(self.depth);
      }
    });
  }
}

/// Pushes `label` onto this thread's scope stack.
pub fn push_scope(label: impl Into<String>) -> ScopeGuard {
  let label = label.into();
  let depth = SCOPES.with(|scopes| {
    let mut scopes = scopes.borrow_mut();
    scopes.push(label);
    scopes.len() - 1
  });
  ScopeGuard {
    depth,
    _thread_bound: PhantomData,
  }
}

/// Copy of this thread's scopes, outermost first.
pub fn current_scopes() -> ScopeStack {
  SCOPES
    .try_with(|scopes| match scopes.try_borrow() {
      Ok(scopes) => scopes.iter().cloned().collect(),
      Err(_) => ScopeStack::new(),
    })
    .unwrap_or_default()
}

pub fn depth() -> usize {
  SCOPES
    .try_with(|scopes| scopes.try_borrow().map(|s| s.len()).unwrap_or_default())
    .unwrap_or_default()
}
