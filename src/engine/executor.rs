//! Execution engine for spatially regularized VB estimation.
//!
//! ## Purpose
//!
//! This module drives the outer iteration loop: re-estimating the
//! spatial hyperparameters from the current posteriors, assembling
//! per-parameter precision contributions, rebuilding every location's
//! prior from its neighbours, delegating the local posterior update to
//! the noise model, and asking the convergence collaborator whether to
//! continue.
//!
//! ## Design notes
//!
//! * **Previous-iteration coupling**: prior reconstruction reads a
//!   snapshot of the posterior means taken at the top of the iteration,
//!   so per-location updates within one iteration are independent of
//!   each other and safe to parallelize.
//! * **Exclusive resources**: the adjacency graph, the covariance cache
//!   and all per-location state are owned by the engine instance;
//!   nothing is shared between runs.
//! * **Recoverable numerics**: singular inversions and exhausted search
//!   budgets degrade to best-effort values with one-time warnings; only
//!   configuration errors and internal-consistency faults abort.
//!
//! ## Invariants
//!
//! * Step order within an iteration is fixed: shrinkage update,
//!   smoothing-scale update, precision assembly, prior reconstruction,
//!   posterior update, evidence posterior update, re-centering,
//!   convergence test.
//! * The first iteration skips hyperparameter updates unless configured
//!   otherwise.
//!
//! ## Non-goals
//!
//! * This module does not validate configuration (see `validator`) and
//!   does not interpret observed data (the noise model's concern).

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::algorithms::covariance::CovarianceCache;
use crate::algorithms::neighborhood::AdjacencyGraph;
use crate::algorithms::priors::{
    self, PriorFamily, PriorType, STS_DIAGONAL_WEIGHT,
};
use crate::engine::hyperparams::{
    clamp_akmean, optimize_evidence, optimize_smoothing_scale, rate_limit,
    shrinkage_akmean_update,
};
use crate::engine::model::{ConvergenceCheck, ForwardModel, NoiseModel};
use crate::math::distance::{distance_matrix, DistanceMetric};
use crate::math::linalg::{FloatLinalg, SymMatrix};
use crate::primitives::dist::MvnDist;
use crate::primitives::errors::SvbError;
use crate::primitives::grid::{self, GridCoord};

// ============================================================================
// Configuration
// ============================================================================

/// Fully validated engine configuration, assembled by the API builder.
#[derive(Debug, Clone)]
pub struct EngineConfig<T> {
    /// Spatial dimensionality (1..=3).
    pub spatial_dims: usize,
    /// Pairwise distance metric for the covariance prior.
    pub distance_metric: DistanceMetric,
    /// Physical size of one grid step along each axis.
    pub voxel_dims: [T; 3],
    /// One prior variant per estimated parameter.
    pub prior_types: Vec<PriorType>,
    /// Starting smoothing scale for every evidence-family parameter.
    pub initial_delta: T,
    /// Fixed log-scale factor for `SmoothnessFixed` parameters.
    pub fixed_rho: T,
    /// Per-iteration multiplicative growth ceiling for `akmean` and
    /// `delta`; `None` disables rate limiting.
    pub rate_ceiling: Option<T>,
    /// Extra evaluations granted to each smoothing-scale search.
    pub delta_evaluations: usize,
    /// Relative bracket tolerance for each smoothing-scale search.
    pub delta_tolerance: T,
    /// Run hyperparameter updates on the first iteration too.
    pub update_on_first_iteration: bool,
    /// Estimate smoothing scales from the marginal evidence (posteriors
    /// with the prior factored out) instead of the variational path.
    pub evidence_optimization: bool,
    /// Re-estimate posterior means/precisions from the evidence
    /// marginal after the noise-model update.
    pub evidence_posterior_update: bool,
    /// Keep covariance matrices cached across root-finder evaluations.
    pub retain_covariance: bool,
    /// Evaluate the per-location objective each iteration.
    pub evaluate_objective: bool,
    /// Per-parameter image priors (per-location prior means).
    pub image_priors: Vec<Option<Vec<T>>>,
    /// Fixed linearization centres; disables re-centering.
    pub locked_linearization: Option<Vec<Vec<T>>>,
}

// ============================================================================
// Run Summary
// ============================================================================

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary<T> {
    /// Outer iterations performed.
    pub iterations: usize,
    /// Global objective of the final iteration.
    pub final_objective: T,
    /// Final smoothing scale per parameter (evidence family only).
    pub delta: Vec<T>,
    /// Final log-scale factor per parameter.
    pub rho: Vec<T>,
    /// Final shrinkage precision multiplier per parameter.
    pub akmean: Vec<T>,
}

// ============================================================================
// Engine
// ============================================================================

/// Per-location spatially regularized VB estimation over a fixed grid.
#[derive(Debug)]
pub struct SpatialPriorEngine<T: FloatLinalg> {
    cfg: EngineConfig<T>,
    n_voxels: usize,
    n_params: usize,

    graph: Option<AdjacencyGraph>,
    cache: Option<CovarianceCache<T>>,
    sts: Option<SymMatrix<T>>,
    second_order_dirichlet: Option<SymMatrix<T>>,
    shrinkage: Option<PriorType>,

    initial_prior: MvnDist<T>,
    akmean: Vec<T>,
    delta: Vec<T>,
    rho: Vec<T>,
    sinvs: Vec<Option<SymMatrix<T>>>,

    priors: Vec<MvnDist<T>>,
    posteriors: Vec<MvnDist<T>>,
    without_prior: Vec<MvnDist<T>>,
    centres: Vec<Vec<T>>,

    objectives: Vec<T>,
    history: Vec<T>,
    iterations: usize,
}

impl<T: FloatLinalg> SpatialPriorEngine<T> {
    /// Assemble the engine from validated configuration, coordinates,
    /// and the forward model. Builds the adjacency graph and/or the
    /// distance matrix only when some prior variant needs them.
    pub(crate) fn from_parts<F: ForwardModel<T>>(
        cfg: EngineConfig<T>,
        coords: &[GridCoord],
        model: &F,
    ) -> Result<Self, SvbError> {
        let n_voxels = coords.len();
        let n_params = cfg.prior_types.len();

        let needs_graph = cfg.prior_types.iter().any(|t| t.needs_graph());
        let needs_cache = cfg.prior_types.iter().any(|t| t.needs_cache());

        let graph = if needs_graph {
            Some(AdjacencyGraph::build(coords, cfg.spatial_dims)?)
        } else {
            // Ordering is an input contract regardless of prior choice.
            if let Some(index) = grid::first_unordered(coords) {
                return Err(SvbError::UnorderedCoordinates { index });
            }
            None
        };

        let cache = if needs_cache {
            let positions = grid::to_positions(coords, cfg.voxel_dims);
            let distances = distance_matrix(&positions, cfg.distance_metric);
            Some(CovarianceCache::new(distances, cfg.retain_covariance))
        } else {
            None
        };

        let shrinkage = priors::shrinkage_variant(&cfg.prior_types);
        let sts = match (shrinkage, &graph) {
            (Some(PriorType::SecondOrderExact), Some(g)) => Some(priors::build_sts(g)),
            _ => None,
        };
        // The Dirichlet second-order structure is only consumed by the
        // evidence posterior update; it is constant, so build it once.
        let second_order_dirichlet = match (shrinkage, &graph) {
            (Some(PriorType::SecondOrderDirichlet), Some(g)) if cfg.evidence_posterior_update => {
                Some(priors::build_second_order_dirichlet(g, cfg.spatial_dims)?)
            }
            _ => None,
        };

        let initial_prior = model.initial_prior();
        if initial_prior.dim() != n_params {
            return Err(SvbError::MismatchedParams {
                expected: n_params,
                got: initial_prior.dim(),
            });
        }
        let initial_posterior = model.initial_posterior();
        if initial_posterior.dim() != n_params {
            return Err(SvbError::MismatchedParams {
                expected: n_params,
                got: initial_posterior.dim(),
            });
        }

        let mut posteriors = vec![initial_posterior.clone(); n_voxels];
        for (v, post) in posteriors.iter_mut().enumerate() {
            model.init_location(v, post);
        }

        let centres = match &cfg.locked_linearization {
            Some(locked) => locked.clone(),
            None => posteriors.iter().map(|p| p.means().to_vec()).collect(),
        };

        let akmean = vec![T::from(1e-8).unwrap_or_else(T::min_positive_value); n_params];
        let delta = vec![cfg.initial_delta; n_params];
        let rho = vec![T::zero(); n_params];

        Ok(Self {
            n_voxels,
            n_params,
            graph,
            cache,
            sts,
            second_order_dirichlet,
            shrinkage,
            priors: vec![initial_prior.clone(); n_voxels],
            initial_prior,
            akmean,
            delta,
            rho,
            sinvs: vec![None; n_params],
            without_prior: vec![initial_posterior; n_voxels],
            posteriors,
            centres,
            objectives: vec![T::zero(); n_voxels],
            history: Vec::new(),
            iterations: 0,
            cfg,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Number of locations.
    #[inline]
    pub fn num_voxels(&self) -> usize {
        self.n_voxels
    }

    /// Number of estimated parameters.
    #[inline]
    pub fn num_params(&self) -> usize {
        self.n_params
    }

    /// Current posterior of every location.
    #[inline]
    pub fn posteriors(&self) -> &[MvnDist<T>] {
        &self.posteriors
    }

    /// Current reconstructed prior of every location.
    #[inline]
    pub fn priors(&self) -> &[MvnDist<T>] {
        &self.priors
    }

    /// Global objective per completed iteration.
    #[inline]
    pub fn objective_history(&self) -> &[T] {
        &self.history
    }

    /// The adjacency graph, if any shrinkage prior required it.
    #[inline]
    pub fn graph(&self) -> Option<&AdjacencyGraph> {
        self.graph.as_ref()
    }

    /// The covariance cache, if any evidence prior required it.
    #[inline]
    pub fn cache(&self) -> Option<&CovarianceCache<T>> {
        self.cache.as_ref()
    }

    // ------------------------------------------------------------------
    // Main loop
    // ------------------------------------------------------------------

    /// Run iterations until the convergence collaborator signals stop.
    pub fn run<N, C>(&mut self, noise: &mut N, conv: &mut C) -> Result<RunSummary<T>, SvbError>
    where
        N: NoiseModel<T>,
        C: ConvergenceCheck<T>,
    {
        conv.reset();
        self.history.clear();
        self.iterations = 0;
        let mut first = true;

        loop {
            self.iterate(noise, first)?;
            first = false;
            self.iterations += 1;

            let objective = self
                .objectives
                .iter()
                .fold(T::zero(), |acc, &f| acc + f);
            self.history.push(objective);
            if conv.test(objective) {
                break;
            }
        }

        Ok(RunSummary {
            iterations: self.iterations,
            final_objective: *self.history.last().unwrap_or(&T::zero()),
            delta: self.delta.clone(),
            rho: self.rho.clone(),
            akmean: self.akmean.clone(),
        })
    }

    /// One outer iteration.
    fn iterate<N: NoiseModel<T>>(&mut self, noise: &mut N, first: bool) -> Result<(), SvbError> {
        let update_hyper = !first || self.cfg.update_on_first_iteration;

        // Snapshot the previous iteration's posterior moments: prior
        // reconstruction and hyperparameter updates couple locations
        // only through these.
        let mean_snapshot: Vec<Vec<T>> = self
            .posteriors
            .iter()
            .map(|p| p.means().to_vec())
            .collect();
        let cov_snapshot: Vec<SymMatrix<T>> = self
            .posteriors
            .iter()
            .map(|p| {
                p.covariance()
                    .unwrap_or_else(|_| SymMatrix::identity(self.n_params))
            })
            .collect();

        if update_hyper {
            self.update_shrinkage(&mean_snapshot, &cov_snapshot);
            self.update_smoothing(&mean_snapshot, &cov_snapshot)?;
        }
        self.assemble_precisions();
        self.reconstruct_and_update(noise, first, &mean_snapshot)?;
        if self.cfg.evidence_posterior_update {
            self.evidence_posterior_update();
        }
        self.recentre();

        Ok(())
    }

    // ------------------------------------------------------------------
    // Step 1: shrinkage hyperparameter update
    // ------------------------------------------------------------------

    fn update_shrinkage(&mut self, means: &[Vec<T>], covs: &[SymMatrix<T>]) {
        let variant = match self.shrinkage {
            Some(v) => v,
            None => return,
        };
        let graph = self
            .graph
            .as_ref()
            .expect("shrinkage priors require the adjacency graph");

        for k in 0..self.n_params {
            let wk: Vec<T> = means.iter().map(|m| m[k]).collect();
            let sigmak: Vec<T> = covs.iter().map(|c| c.get(k, k)).collect();
            let updated =
                shrinkage_akmean_update(variant, graph, self.cfg.spatial_dims, &wk, &sigmak);
            self.akmean[k] = clamp_akmean(updated, self.akmean[k], self.cfg.rate_ceiling);
        }
        log::debug!("akmean updated: {:?}", self.akmean);
    }

    // ------------------------------------------------------------------
    // Step 2: smoothing-scale update
    // ------------------------------------------------------------------

    fn update_smoothing(&mut self, means: &[Vec<T>], covs: &[SymMatrix<T>]) -> Result<(), SvbError> {
        for k in 0..self.n_params {
            let ptype = self.cfg.prior_types[k];
            if ptype.family() != PriorFamily::Evidence {
                continue;
            }

            let cache = self
                .cache
                .as_mut()
                .expect("evidence priors require the covariance cache");

            let prior_prec = self.initial_prior.precisions().get(k, k);
            let prior_var = T::one() / prior_prec;
            let prior_mean = self.initial_prior.means()[k];

            if ptype == PriorType::SmoothnessFixed {
                self.delta[k] = self.cfg.initial_delta;
                self.rho[k] = self.cfg.fixed_rho;
                continue;
            }

            let allow_rho = ptype == PriorType::SmoothnessScaled;
            let guess = self.delta[k];
            let previous = self.delta[k];

            let (mut delta, mut rho) = if self.cfg.evidence_optimization {
                let prec_wp: Vec<T> = self
                    .without_prior
                    .iter()
                    .map(|d| d.precisions().get(k, k))
                    .collect();
                let mean_wp: Vec<T> = self.without_prior.iter().map(|d| d.means()[k]).collect();
                optimize_evidence(
                    cache,
                    &prec_wp,
                    &mean_wp,
                    prior_mean,
                    prior_var,
                    guess,
                    allow_rho,
                    self.cfg.delta_tolerance,
                    self.cfg.delta_evaluations,
                )?
            } else {
                let cov_ratio: Vec<T> = covs.iter().map(|c| c.get(k, k) / prior_var).collect();
                let mean_diff_ratio: Vec<T> = means
                    .iter()
                    .map(|m| (m[k] - prior_mean) / prior_var.sqrt())
                    .collect();
                optimize_smoothing_scale(
                    cache,
                    &cov_ratio,
                    &mean_diff_ratio,
                    guess,
                    allow_rho,
                    true,
                    self.cfg.delta_tolerance,
                    self.cfg.delta_evaluations,
                )?
            };

            let (limited, clamped) = rate_limit(delta, previous, self.cfg.rate_ceiling);
            if clamped {
                delta = limited;
                // The log-scale factor is tied to the scale it was
                // solved at; redo it for the clamped value.
                let cov_ratio: Vec<T> = covs.iter().map(|c| c.get(k, k) / prior_var).collect();
                let mean_diff_ratio: Vec<T> = means
                    .iter()
                    .map(|m| (m[k] - prior_mean) / prior_var.sqrt())
                    .collect();
                let (_, rho2) = optimize_smoothing_scale(
                    cache,
                    &cov_ratio,
                    &mean_diff_ratio,
                    delta,
                    allow_rho,
                    false,
                    self.cfg.delta_tolerance,
                    self.cfg.delta_evaluations,
                )?;
                rho = rho2;
            }

            self.delta[k] = delta;
            self.rho[k] = rho;
            log::debug!("parameter {}: delta = {:?}, rho = {:?}", k, delta, rho);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Step 3: precision assembly
    // ------------------------------------------------------------------

    fn assemble_precisions(&mut self) {
        for k in 0..self.n_params {
            let ptype = self.cfg.prior_types[k];
            self.sinvs[k] = match ptype.family() {
                PriorFamily::Evidence => {
                    let cache = self
                        .cache
                        .as_mut()
                        .expect("evidence priors require the covariance cache");
                    let mut sinv = cache.c_inv(self.delta[k]).clone();
                    let scale = self.rho[k].exp() * self.initial_prior.precisions().get(k, k);
                    sinv.scale(scale);
                    Some(sinv)
                }
                // Shrinkage contributions materialize as full matrices
                // only for the evidence posterior update; the per-voxel
                // prior reconstruction works from the graph directly.
                PriorFamily::Shrinkage if self.cfg.evidence_posterior_update => {
                    let structure = match ptype {
                        PriorType::SecondOrderExact => self.sts.as_ref(),
                        PriorType::SecondOrderDirichlet => self.second_order_dirichlet.as_ref(),
                        _ => None,
                    };
                    structure.map(|m| {
                        let mut sinv = m.clone();
                        sinv.scale(self.akmean[k]);
                        sinv
                    })
                }
                _ => None,
            };
        }
    }

    // ------------------------------------------------------------------
    // Steps 4 + 5: prior reconstruction and posterior update
    // ------------------------------------------------------------------

    fn reconstruct_and_update<N: NoiseModel<T>>(
        &mut self,
        noise: &mut N,
        first: bool,
        mean_snapshot: &[Vec<T>],
    ) -> Result<(), SvbError> {
        let need_wp = self.cfg.evidence_optimization || self.cfg.evidence_posterior_update;

        for v in 0..self.n_voxels {
            let fard = self.reconstruct_prior(v, first, mean_snapshot)?;

            let wp = if need_wp {
                Some(&mut self.without_prior[v])
            } else {
                None
            };
            noise.update_posterior(
                v,
                &self.priors[v],
                &mut self.posteriors[v],
                &self.centres[v],
                wp,
            )?;

            self.objectives[v] = if self.cfg.evaluate_objective {
                noise.calc_objective(v, &self.priors[v], &self.posteriors[v], &self.centres[v])
                    + fard
            } else {
                T::zero()
            };
        }
        Ok(())
    }

    /// Rebuild the prior for one location; returns the ARD objective
    /// correction accumulated for it.
    fn reconstruct_prior(
        &mut self,
        v: usize,
        first: bool,
        mean_snapshot: &[Vec<T>],
    ) -> Result<T, SvbError> {
        let kp = self.n_params;
        let init_prec = self.initial_prior.precisions().clone();
        let init_means = self.initial_prior.means().to_vec();

        // Shrinkage-family contribution, shared across all parameters
        // of the shrinkage variant.
        let shrink = self
            .shrinkage
            .map(|variant| self.shrinkage_prior_parts(v, variant, mean_snapshot));

        let mut fard = T::zero();
        let mut final_prec = vec![T::zero(); kp];
        let mut final_means = vec![T::zero(); kp];

        for k in 0..kp {
            let ptype = self.cfg.prior_types[k];
            match ptype.family() {
                PriorFamily::Shrinkage => {
                    let (prec_k, mean_k) = shrink
                        .as_ref()
                        .map(|parts| (parts.precisions[k], parts.means[k]))
                        .unwrap_or((init_prec.get(k, k), init_means[k]));
                    final_prec[k] = prec_k;
                    final_means[k] = mean_k;
                }
                PriorFamily::Nonspatial => match ptype {
                    PriorType::Ard => {
                        if first {
                            final_prec[k] = init_prec.get(k, k);
                            final_means[k] = init_means[k];
                        } else {
                            let post = &self.posteriors[v];
                            let mean = post.means()[k];
                            let prec = post.precisions().get(k, k);
                            let ard = T::one() / prec + mean * mean;
                            final_prec[k] = T::one() / ard;
                            final_means[k] = T::zero();
                            let two = T::from(2.0).unwrap_or_else(T::one);
                            fard = fard - two * (two / ard).ln();
                        }
                    }
                    PriorType::Image => {
                        final_prec[k] = init_prec.get(k, k);
                        final_means[k] = self.cfg.image_priors[k]
                            .as_ref()
                            .map(|img| img[v])
                            .unwrap_or(init_means[k]);
                    }
                    _ => {
                        final_prec[k] = init_prec.get(k, k);
                        final_means[k] = init_means[k];
                    }
                },
                PriorFamily::Evidence => {
                    let sinv = self.sinvs[k]
                        .as_ref()
                        .expect("evidence precision assembled each iteration");
                    let prec = sinv.get(v, v);
                    // Marginalize out the other locations: the prior mean
                    // shifts by the precision-weighted deviations of the
                    // neighbours' posterior means.
                    let mut weighted = T::zero();
                    for n in 0..self.n_voxels {
                        if n != v {
                            weighted =
                                weighted + sinv.get(n, v) * (mean_snapshot[n][k] - init_means[k]);
                        }
                    }
                    final_prec[k] = prec;
                    final_means[k] = init_means[k] - weighted / prec;
                }
            }
        }

        let mut prec = SymMatrix::zeros(kp);
        for k in 0..kp {
            prec.set(k, k, final_prec[k]);
        }
        self.priors[v].set_precisions(prec);
        self.priors[v].set_means(&final_means);

        Ok(fard)
    }

    /// Per-parameter prior precision and mean for the shrinkage variant
    /// at one location.
    fn shrinkage_prior_parts(
        &self,
        v: usize,
        variant: PriorType,
        mean_snapshot: &[Vec<T>],
    ) -> ShrinkageParts<T> {
        let graph = self
            .graph
            .as_ref()
            .expect("shrinkage priors require the adjacency graph");
        let kp = self.n_params;
        let dims_t = T::from(self.cfg.spatial_dims).unwrap_or_else(T::one);
        let two = T::from(2.0).unwrap_or_else(T::one);
        let four = two * two;
        let eight = four * two;

        if variant == PriorType::SecondOrderExact {
            // Exact second-order field: row of StS weights the
            // neighbourhood directly.
            let sts = self.sts.as_ref().expect("StS built for the S variant");
            let eps = T::from(STS_DIAGONAL_WEIGHT).unwrap_or_else(T::epsilon);
            let mut weight = eps;
            let mut contrib = vec![T::zero(); kp];
            for i in 0..self.n_voxels {
                if i != v {
                    let w = sts.get(v, i);
                    weight = weight + w;
                    for k in 0..kp {
                        contrib[k] = contrib[k] + w * mean_snapshot[i][k];
                    }
                }
            }
            let precisions: Vec<T> = (0..kp).map(|k| self.akmean[k] * sts.get(v, v)).collect();
            let means: Vec<T> = contrib.iter().map(|&c| c / weight).collect();
            return ShrinkageParts { precisions, means };
        }

        let nn = graph.degree(v);
        let nn_t = T::from(nn).unwrap_or_else(T::zero);

        let mut contrib8 = vec![T::zero(); kp];
        let mut weight8 = T::zero();
        for &n in graph.neighbours(v) {
            for k in 0..kp {
                contrib8[k] = contrib8[k] + eight * mean_snapshot[n][k];
            }
            weight8 = weight8 + eight;
        }

        let mut contrib12 = vec![T::zero(); kp];
        let mut weight12 = T::zero();
        for &n in graph.neighbours2(v) {
            for k in 0..kp {
                contrib12[k] = contrib12[k] - mean_snapshot[n][k];
            }
            weight12 = weight12 - T::one();
        }

        if variant == PriorType::SecondOrderDirichlet {
            // Dirichlet boundaries: boundary locations count as fully
            // surrounded.
            weight8 = eight * two * dims_t;
            weight12 = -(four * dims_t * dims_t - nn_t);
        }

        let spatial_weight: T = variant.shrinkage_precision_weight(nn, self.cfg.spatial_dims);
        let init_prec = self.initial_prior.precisions();
        let init_means = self.initial_prior.means();

        let mut precisions = vec![T::zero(); kp];
        let mut means = vec![T::zero(); kp];
        for k in 0..kp {
            let spatial_prec = self.akmean[k] * spatial_weight;

            let m_tmp = match variant {
                PriorType::MrfDirichlet => contrib8[k] / (eight * dims_t * two),
                PriorType::Mrf => {
                    contrib8[k] / (eight * (nn_t + T::from(1e-8).unwrap_or_else(T::epsilon)))
                }
                _ => {
                    if weight8 != T::zero() {
                        (contrib8[k] + contrib12[k]) / (weight8 + weight12)
                    } else {
                        T::zero()
                    }
                }
            };

            let dirichlet = matches!(
                variant,
                PriorType::MrfDirichlet | PriorType::SecondOrderDirichlet
            );
            let prec_k = if dirichlet {
                spatial_prec
            } else {
                init_prec.get(k, k) + spatial_prec
            };

            let mean_k = if matches!(variant, PriorType::MrfDirichlet | PriorType::Mrf) {
                spatial_prec * m_tmp / prec_k
            } else {
                (spatial_prec * m_tmp + init_prec.get(k, k) * init_means[k]) / prec_k
            };

            precisions[k] = prec_k;
            means[k] = mean_k;
        }

        ShrinkageParts { precisions, means }
    }

    // ------------------------------------------------------------------
    // Step 6: evidence posterior update
    // ------------------------------------------------------------------

    /// Re-estimate posterior means and marginal precisions of every
    /// evidence-family parameter from the joint spatial marginal
    /// `SigmaInv = XXtr + Sinv`. Precisions are written back diagonal
    /// only.
    fn evidence_posterior_update(&mut self) {
        let n = self.n_voxels;
        let init_means = self.initial_prior.means().to_vec();

        let mut new_means: Vec<Option<Vec<T>>> = vec![None; self.n_params];
        let mut new_precs: Vec<Option<Vec<T>>> = vec![None; self.n_params];

        for k in 0..self.n_params {
            let ci = match self.sinvs[k].as_ref() {
                Some(ci) => ci,
                None => continue,
            };

            let mut sigma_inv = ci.clone();
            let mut xytr = vec![T::zero(); n];
            let mut xxtr_mu_others = vec![T::zero(); n];
            for v in 0..n {
                let wp = &self.without_prior[v];
                let prec = wp.precisions();
                sigma_inv.set(v, v, sigma_inv.get(v, v) + prec.get(k, k));

                let diff: Vec<T> = wp
                    .means()
                    .iter()
                    .zip(init_means.iter())
                    .map(|(&m, &m0)| m - m0)
                    .collect();
                xytr[v] = prec.row(k).iter().zip(diff.iter()).fold(T::zero(), |a, (&p, &d)| a + p * d);

                let mut others: Vec<T> = self.posteriors[v]
                    .means()
                    .iter()
                    .zip(init_means.iter())
                    .map(|(&m, &m0)| m - m0)
                    .collect();
                others[k] = T::zero();
                xxtr_mu_others[v] = prec
                    .row(k)
                    .iter()
                    .zip(others.iter())
                    .fold(T::zero(), |a, (&p, &d)| a + p * d);
            }

            let sigma = match sigma_inv.inverse() {
                Some(s) => s,
                None => {
                    crate::warn_once!(
                        "evidence marginal inversion failed; keeping noise-model posteriors"
                    );
                    continue;
                }
            };
            let rhs: Vec<T> = xytr
                .iter()
                .zip(xxtr_mu_others.iter())
                .map(|(&a, &b)| a - b)
                .collect();
            let mu = sigma.mul_vec(&rhs);

            new_means[k] = Some(mu);
            new_precs[k] = Some((0..n).map(|v| sigma_inv.get(v, v)).collect());
        }

        for v in 0..n {
            let mut changed = false;
            let mut means = self.posteriors[v].means().to_vec();
            let prec_old = self.posteriors[v].precisions().clone();
            let mut prec = SymMatrix::zeros(self.n_params);
            for k in 0..self.n_params {
                prec.set(k, k, prec_old.get(k, k));
            }
            for k in 0..self.n_params {
                if let (Some(mu), Some(pk)) = (&new_means[k], &new_precs[k]) {
                    means[k] = mu[v] + init_means[k];
                    prec.set(k, k, pk[v]);
                    changed = true;
                }
            }
            if changed {
                self.posteriors[v].set_means(&means);
                self.posteriors[v].set_precisions(prec);
            }
        }
    }

    // ------------------------------------------------------------------
    // Step 7: linearization re-centering
    // ------------------------------------------------------------------

    fn recentre(&mut self) {
        if self.cfg.locked_linearization.is_some() {
            return;
        }
        for (centre, post) in self.centres.iter_mut().zip(self.posteriors.iter()) {
            centre.copy_from_slice(post.means());
        }
    }
}

/// Shrinkage-family prior contribution at one location.
struct ShrinkageParts<T> {
    precisions: Vec<T>,
    means: Vec<T>,
}
