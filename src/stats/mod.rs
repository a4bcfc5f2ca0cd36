//! Statistical building blocks of the analysis: marginals, moments,
//! autocorrelation, the correlation transform, and the numerical solvers
//! they rely on.

pub mod acf;
pub mod acs;
pub mod actf;
pub mod lsq;
pub mod marginal;
pub mod moments;
pub mod quadrature;
pub mod special;
pub mod summary;
pub mod yule_walker;

pub use acf::{AutocorrelationEstimator, EmpiricalAcf};
pub use acs::{AcsModel, FittedAcs};
pub use actf::{ActfCoefficients, ActfPoint, ActiveCorrelationIntegrator, AutocorrelationTransformFitter};
pub use marginal::{DistributionFamily, FittedMarginal, Marginal};
pub use moments::{MomentCalculator, Moments};
pub use summary::{DensityBin, DescriptiveStats};
pub use yule_walker::{ArStructure, YuleWalkerSolver};
