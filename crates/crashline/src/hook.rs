// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide panic hook chain.
//!
//! Installing takes whatever hook is currently registered (usually the std
//! default that prints the panic message) and keeps it as the last link of
//! an ordered chain:
//!
//! ```text
//! reporting handler -> registered handlers... -> previous hook
//! ```
//!
//! Every link runs on the panicking thread with the same `PanicHookInfo`.
//! Installing again swaps the reporting handler in place, so the chain
//! never nests. If some other code replaced the process hook in between,
//! the dispatcher is put back in front and the replacement becomes the new
//! previous hook.

use std::cell::Cell;
use std::panic::PanicHookInfo;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// A link in the panic hook chain.
pub type PanicHandler = Arc<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

type BoxedHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

/// Identifies the dispatcher box currently alive, if any.
struct DispatcherId {
	alive: Weak<()>,
	addr: usize,
}

impl DispatcherId {
	fn matches(&self, hook: &BoxedHook) -> bool {
		self.alive.strong_count() > 0 && self.addr == hook_addr(hook)
	}
}

struct HookChain {
	reporting: Option<PanicHandler>,
	registered: Vec<PanicHandler>,
	// Hooks found in place at install time, oldest first. Only the newest
	// runs directly; older ones are reached when a newer hook calls back
	// into a dispatcher it wrapped.
	previous: Vec<PanicHandler>,
	dispatcher: Option<DispatcherId>,
}

impl HookChain {
	const fn new() -> Self {
		Self {
			reporting: None,
			registered: Vec::new(),
			previous: Vec::new(),
			dispatcher: None,
		}
	}

	fn links(&self, depth: usize) -> Vec<PanicHandler> {
		if depth > 0 {
			return self
				.previous
				.len()
				.checked_sub(depth + 1)
				.map(|i| vec![Arc::clone(&self.previous[i])])
				.unwrap_or_default();
		}
		self.reporting
			.iter()
			.chain(self.registered.iter())
			.chain(self.previous.last())
			.cloned()
			.collect()
	}
}

static CHAIN: RwLock<HookChain> = RwLock::new(HookChain::new());
// Serializes take_hook/set_hook pairs. Never held while dispatching.
static INSTALL: Mutex<()> = Mutex::new(());

thread_local! {
	static DEPTH: Cell<usize> = const { Cell::new(0) };
}

fn hook_addr(hook: &BoxedHook) -> usize {
	(&**hook as *const _) as *const () as usize
}

/// Wrap a closure as a [`PanicHandler`].
pub fn handler<F>(f: F) -> PanicHandler
where
	F: Fn(&PanicHookInfo<'_>) + Send + Sync + 'static,
{
	Arc::new(f)
}

/// Make the dispatcher the process panic hook, chaining to whatever was
/// registered if it is not the dispatcher already.
fn ensure_dispatcher() {
	let _install = INSTALL.lock().unwrap_or_else(PoisonError::into_inner);

	let current = std::panic::take_hook();
	let mut chain = CHAIN.write().unwrap_or_else(PoisonError::into_inner);
	if chain.dispatcher.as_ref().is_some_and(|id| id.matches(&current)) {
		drop(chain);
		std::panic::set_hook(current);
		return;
	}

	let token = Arc::new(());
	let dispatcher: BoxedHook = {
		let token = Arc::clone(&token);
		Box::new(move |info| {
			let _alive = &token;
			dispatch(info);
		})
	};
	chain.previous.push(Arc::from(current));
	chain.dispatcher = Some(DispatcherId {
		alive: Arc::downgrade(&token),
		addr: hook_addr(&dispatcher),
	});
	// A panic on another thread must not wait on CHAIN while std holds its
	// hook lock, so release it before set_hook.
	drop(chain);
	std::panic::set_hook(dispatcher);
}

/// Install `handler` as the first link of the chain.
///
/// Replaces any reporting handler installed earlier, and puts the
/// dispatcher back in front if the process hook was replaced since.
///
/// # Panics
///
/// Like [`std::panic::take_hook`], panics when called from a panicking
/// thread.
pub fn install(handler: PanicHandler) {
	CHAIN.write().unwrap_or_else(PoisonError::into_inner).reporting = Some(handler);
	ensure_dispatcher();
}

/// Append a handler that runs after the reporting handler and before the
/// previous hook.
pub fn register(handler: PanicHandler) {
	CHAIN
		.write()
		.unwrap_or_else(PoisonError::into_inner)
		.registered
		.push(handler);
	ensure_dispatcher();
}

/// Whether a dispatcher is alive, either as the process hook or wrapped by
/// the hook that replaced it.
pub fn is_installed() -> bool {
	CHAIN
		.read()
		.unwrap_or_else(PoisonError::into_inner)
		.dispatcher
		.as_ref()
		.is_some_and(|id| id.alive.strong_count() > 0)
}

/// Number of links a panic currently runs through, including the previous hook.
pub fn chain_len() -> usize {
	CHAIN.read().unwrap_or_else(PoisonError::into_inner).links(0).len()
}

fn dispatch(info: &PanicHookInfo<'_>) {
	let depth = DEPTH.with(|d| d.replace(d.get() + 1));
	// Snapshot so a handler may register without deadlocking.
	let links = CHAIN.read().unwrap_or_else(PoisonError::into_inner).links(depth);
	for link in links {
		link(info);
	}
	DEPTH.with(|d| d.set(depth));
}
