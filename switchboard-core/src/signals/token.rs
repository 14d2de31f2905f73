//! Signal tokens and declarations.
//!
//! A signal is identified by the pair (owner, token). The token is created
//! once per declared signal and never compared by name, so two signals that
//! happen to share a name on related types stay distinct.
//!
//! [`declare_signal`] memoises one token per (type, name) pair, which is the
//! closest Rust gets to declaring a signal property on a class.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::SignalError;

/// Opaque identity of a declared signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(u64);

impl TokenId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A signal token carrying its argument type.
pub struct Token<A: 'static> {
    id: TokenId,
    name: &'static str,
    _args: PhantomData<fn(&A)>,
}

impl<A: 'static> Token<A> {
    /// Create a fresh token. Every call yields a distinct signal.
    pub fn new(name: &'static str) -> Self {
        Self::from_parts(TokenId::next(), name)
    }

    fn from_parts(id: TokenId, name: &'static str) -> Self {
        Self {
            id,
            name,
            _args: PhantomData,
        }
    }

    /// The token's identity.
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Diagnostic name. Not used for matching.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<A: 'static> Clone for Token<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: 'static> Copy for Token<A> {}

impl<A: 'static> PartialEq for Token<A> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<A: 'static> Eq for Token<A> {}

impl<A: 'static> fmt::Debug for Token<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
struct Declaration {
    token: TokenId,
    args: TypeId,
    args_name: &'static str,
}

type DeclarationTable = HashMap<TypeId, IndexMap<&'static str, Declaration>>;

static DECLARATIONS: OnceLock<RwLock<DeclarationTable>> = OnceLock::new();

fn declarations() -> &'static RwLock<DeclarationTable> {
    DECLARATIONS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Declare signal `name` on type `T` with arguments `A`.
///
/// The first call for a given (`T`, `name`) creates the token; later calls
/// return the same one. Redeclaring with a different `A` is rejected.
///
/// # Example
///
/// ```rust,ignore
/// struct Slider;
///
/// let moved = declare_signal::<Slider, f32>("moved")?;
/// assert_eq!(moved, declare_signal::<Slider, f32>("moved")?);
/// ```
pub fn declare_signal<T: 'static, A: 'static>(name: &'static str) -> Result<Token<A>, SignalError> {
    let owner = TypeId::of::<T>();
    let args = TypeId::of::<A>();

    if let Some(existing) = declarations()
        .read()
        .get(&owner)
        .and_then(|signals| signals.get(name).copied())
    {
        return check_declaration(existing, name, args, type_name::<A>());
    }

    let mut table = declarations().write();
    let signals = table.entry(owner).or_default();

    // Another thread may have declared it between the two locks.
    if let Some(existing) = signals.get(name).copied() {
        return check_declaration(existing, name, args, type_name::<A>());
    }

    let token = TokenId::next();
    signals.insert(
        name,
        Declaration {
            token,
            args,
            args_name: type_name::<A>(),
        },
    );
    tracing::debug!(owner = type_name::<T>(), signal = name, "declared signal");

    Ok(Token::from_parts(token, name))
}

fn check_declaration<A: 'static>(
    existing: Declaration,
    name: &'static str,
    args: TypeId,
    args_name: &'static str,
) -> Result<Token<A>, SignalError> {
    if existing.args != args {
        return Err(SignalError::ArgumentMismatch {
            name,
            declared: existing.args_name,
            requested: args_name,
        });
    }
    Ok(Token::from_parts(existing.token, name))
}

/// Names of the signals declared on `T`, in declaration order.
pub fn declared_signals<T: 'static>() -> Vec<&'static str> {
    declarations()
        .read()
        .get(&TypeId::of::<T>())
        .map(|signals| signals.keys().copied().collect())
        .unwrap_or_default()
}
