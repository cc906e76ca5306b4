use crate::model::{ActionId, Effect, FluentId, Problem};

/// An effect that may modify a fluent: the `effect`-th effect of `action`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Writer {
    pub action: ActionId,
    pub effect: usize,
}

impl Writer {
    pub fn get<'a>(&self, problem: &'a Problem) -> &'a Effect {
        &problem.action(self.action).effects[self.effect]
    }
}

/// Read-only index of the effects that can modify each fluent.
///
/// Computed in a single pass over the actions once the problem is built, after which it is never mutated.
#[derive(Clone, Debug)]
pub struct EffectIndex {
    writers: Vec<Vec<Writer>>,
}

impl EffectIndex {
    pub fn new(problem: &Problem) -> Self {
        let mut writers = vec![Vec::new(); problem.num_fluents()];
        for action in problem.action_ids() {
            for (effect, eff) in problem.action(action).effects.iter().enumerate() {
                writers[usize::from(eff.fluent)].push(Writer { action, effect });
            }
        }
        EffectIndex { writers }
    }

    /// All effects on `fluent`, by increasing action then effect index.
    pub fn writers(&self, fluent: FluentId) -> &[Writer] {
        &self.writers[usize::from(fluent)]
    }

    /// Effects of `action` on `fluent`.
    pub fn writers_of(&self, fluent: FluentId, action: ActionId) -> impl Iterator<Item = &Writer> + '_ {
        self.writers(fluent).iter().filter(move |w| w.action == action)
    }

    pub fn is_written_by(&self, fluent: FluentId, action: ActionId) -> bool {
        self.writers_of(fluent, action).next().is_some()
    }
}

/// Position of each action in the canonical order, and for each fluent the distinct actions
/// writing it, sorted by that order.
///
/// The chain of a fluent `f` with writers `w1 < ... < wn` has `n + 1` links: link `0` is the value
/// of `f` at the start of the step and link `k` its value once `wk` has been applied.
#[derive(Clone, Debug)]
pub struct ChainIndex {
    order: Vec<ActionId>,
    rank: Vec<usize>,
    chains: Vec<Vec<ActionId>>,
}

impl ChainIndex {
    /// `order` must be a permutation of the problem's actions.
    pub fn new(problem: &Problem, effects: &EffectIndex, order: Vec<ActionId>) -> Self {
        debug_assert_eq!(order.len(), problem.num_actions());
        let mut rank = vec![0; order.len()];
        for (i, a) in order.iter().enumerate() {
            rank[usize::from(*a)] = i;
        }
        let chains = problem
            .fluent_ids()
            .map(|f| {
                let mut chain: Vec<ActionId> = effects.writers(f).iter().map(|w| w.action).collect();
                chain.sort_by_key(|a| rank[usize::from(*a)]);
                chain.dedup();
                chain
            })
            .collect();
        ChainIndex { order, rank, chains }
    }

    /// The canonical order of actions.
    pub fn order(&self) -> &[ActionId] {
        &self.order
    }

    pub fn rank(&self, action: ActionId) -> usize {
        self.rank[usize::from(action)]
    }

    /// Actions writing `fluent`, in canonical order.
    pub fn chain(&self, fluent: FluentId) -> &[ActionId] {
        &self.chains[usize::from(fluent)]
    }

    pub fn num_links(&self, fluent: FluentId) -> usize {
        self.chain(fluent).len() + 1
    }

    /// Link of `fluent` relevant to `action`.
    ///
    /// If `is_effect`, this is the link written by the action, which must be a writer of the fluent.
    /// Otherwise, it is the link of the last writer that precedes the action in the canonical order,
    /// or `0` if there is none.
    pub fn link_for(&self, fluent: FluentId, action: ActionId, is_effect: bool) -> usize {
        let rank = self.rank(action);
        let chain = self.chain(fluent);
        let before = chain.partition_point(|a| self.rank(*a) < rank);
        if is_effect {
            debug_assert_eq!(chain.get(before), Some(&action));
            before + 1
        } else {
            before
        }
    }

    /// The action whose effects are captured by the given link, `None` for link `0`.
    pub fn writer_at(&self, fluent: FluentId, link: usize) -> Option<ActionId> {
        link.checked_sub(1).and_then(|i| self.chain(fluent).get(i).copied())
    }
}
