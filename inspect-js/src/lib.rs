//! Lexical scope and call frame simulator for JavaScript debugger tests.
//!
//! Given a program description, this crate predicts what a step debugger's variables view should
//! show at each pause point:
//! - Static declaration and hoisting ([`declare`], [`ScopeTree`])
//! - Runtime scope instances and bindings ([`ScopeArena`]) with temporal dead zones
//! - Call frames, closures and their captured scopes ([`CallStack`], [`ClosureSnapshot`])
//! - Value classification and debugger-style descriptions ([`classify`], [`describe`])
//! - Pausing, snapshots, and frame dropping through an [`Observer`] ([`Simulator`],
//!   [`SnapshotRecorder`])
//!
//! Execution is single-threaded and deterministic. The only piece meant to cross threads is
//! [`InterruptHandle`].

pub mod builtins;
mod classify;
mod closure;
mod env;
mod error;
mod exec;
mod frame;
mod heap;
mod interrupt;
mod options;
pub mod program;
mod recorder;
pub mod scope;
mod value;

pub use crate::builtins::Builtin;
pub use crate::classify::classify;
pub use crate::classify::describe;
pub use crate::classify::entries;
pub use crate::classify::typed_views;
pub use crate::classify::Category;
pub use crate::classify::Entry;
pub use crate::classify::EntryPage;
pub use crate::classify::EntryRange;
pub use crate::classify::RemoteValue;
pub use crate::classify::TypedView;
pub use crate::closure::captured;
pub use crate::closure::closure_scope;
pub use crate::closure::free_variable_table;
pub use crate::closure::free_variables;
pub use crate::closure::ClosureSnapshot;
pub use crate::env::Binding;
pub use crate::env::BindingRef;
pub use crate::env::EnvScope;
pub use crate::env::ScopeArena;
pub use crate::env::ScopeRef;
pub use crate::error::SimError;
pub use crate::error::Termination;
pub use crate::error::TerminationReason;
pub use crate::exec::Control;
pub use crate::exec::Observer;
pub use crate::exec::Pause;
pub use crate::exec::Recovery;
pub use crate::exec::Simulator;
pub use crate::exec::GLOBAL_FRAME_NAME;
pub use crate::frame::CallFrame;
pub use crate::frame::CallStack;
pub use crate::frame::FrameId;
pub use crate::frame::StackFrame;
pub use crate::heap::Closure;
pub use crate::heap::ContainerData;
pub use crate::heap::ContainerKind;
pub use crate::heap::Heap;
pub use crate::heap::HeapObject;
pub use crate::heap::ObjectId;
pub use crate::heap::ObjectKind;
pub use crate::heap::Signedness;
pub use crate::heap::TypedArrayKind;
pub use crate::heap::FUNCTION_SOURCE_UNAVAILABLE;
pub use crate::interrupt::InterruptHandle;
pub use crate::interrupt::InterruptToken;
pub use crate::options::Budget;
pub use crate::options::SimOptions;
pub use crate::program::DeclKind;
pub use crate::program::Program;
pub use crate::recorder::InspectedValue;
pub use crate::recorder::Inspector;
pub use crate::recorder::PauseEvent;
pub use crate::recorder::Record;
pub use crate::recorder::ScopeView;
pub use crate::recorder::ScopeViewKind;
pub use crate::recorder::Snapshot;
pub use crate::recorder::SnapshotEntry;
pub use crate::recorder::SnapshotRecorder;
pub use crate::scope::declare;
pub use crate::scope::declare_with_diagnostics;
pub use crate::scope::FunctionId;
pub use crate::scope::ScopeId;
pub use crate::scope::ScopeKind;
pub use crate::scope::ScopeTree;
pub use crate::value::number_to_string;
pub use crate::value::Value;
