use crate::core::models::topology::Topology;
use crate::core::params::store::{KeyLayout, ParameterStore};
use tracing::debug;

#[derive(Debug)]
struct WarmPlan<P> {
    num_atoms: usize,
    layout: KeyLayout,
    plan: P,
}

/// Lazily built, per-term evaluation plan holding resolved parameter offsets.
///
/// The plan is built on first use and reused while the topology keeps its atom
/// count and the parameter store keeps its key layout. A changed count or layout
/// rebuilds the plan; [`OffsetCache::reset`] discards it explicitly. With caching
/// disabled the plan is rebuilt on every evaluation, which yields identical results.
#[derive(Debug)]
pub struct OffsetCache<P> {
    enabled: bool,
    warm: Option<WarmPlan<P>>,
}

impl<P> OffsetCache<P> {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            warm: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_warm(&self) -> bool {
        self.warm.is_some()
    }

    pub fn reset(&mut self) {
        self.warm = None;
    }

    /// Same configuration, no plan.
    pub fn cold_copy(&self) -> Self {
        Self::new(self.enabled)
    }

    /// Runs `eval` against the cached plan, building it with `build` when the cache is
    /// cold, stale or disabled.
    pub fn with_plan<R, E>(
        &mut self,
        topology: &Topology,
        params: &ParameterStore,
        build: impl FnOnce() -> Result<P, E>,
        eval: impl FnOnce(&P) -> R,
    ) -> Result<R, E> {
        if !self.enabled {
            let plan = build()?;
            return Ok(eval(&plan));
        }

        let warm = match self.warm.take() {
            Some(warm)
                if warm.num_atoms == topology.num_atoms()
                    && warm.layout.same_as(&params.layout()) =>
            {
                warm
            }
            stale => {
                if stale.is_some() {
                    debug!(
                        num_atoms = topology.num_atoms(),
                        "Discarding stale offset cache"
                    );
                }
                let plan = build()?;
                debug!(num_atoms = topology.num_atoms(), "Populated offset cache");
                WarmPlan {
                    num_atoms: topology.num_atoms(),
                    layout: params.layout(),
                    plan,
                }
            }
        };

        let result = eval(&warm.plan);
        self.warm = Some(warm);
        Ok(result)
    }
}
