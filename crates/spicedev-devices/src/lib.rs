//! Nonlinear device-model evaluation and matrix stamping.
//!
//! Given the present Newton iterate, every device model here:
//! - derives temperature-corrected parameters once per temperature,
//! - evaluates terminal currents, charges and their derivatives,
//! - stamps the linearized model into the shared matrix and RHS,
//! - judges whether the iterate is converged,
//! - supplies small-signal admittances and noise densities.
//!
//! The EKV 2.6 MOSFET is the implemented family. Models are driven through
//! the [`Stamp`] trait; [`DeviceLibrary`] aggregates every model in a circuit.
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use spicedev_core::{CircuitContext, MnaMatrix, NodeId, NodeTable, StateAllocator};
//! use spicedev_devices::ekv::{EkvInstance, EkvInstanceParams, EkvModel, EkvModelParams};
//! use spicedev_devices::{DeviceLibrary, Stamp};
//!
//! let mut nodes = NodeTable::new();
//! let d = nodes.add("d");
//! let g = nodes.add("g");
//!
//! let mut model = EkvModel::new("nch", EkvModelParams::nmos());
//! model.add_instance(EkvInstance::new(
//!     "M1",
//!     d,
//!     g,
//!     NodeId::GROUND,
//!     NodeId::GROUND,
//!     EkvInstanceParams::with_geometry(10e-6, 1e-6),
//! ));
//! let mut lib = DeviceLibrary::new();
//! lib.add(model);
//!
//! let mut alloc = StateAllocator::new();
//! lib.setup(&mut nodes, &mut alloc).unwrap();
//! let mut matrix = MnaMatrix::new(nodes.num_nodes());
//! lib.bind(&mut matrix).unwrap();
//!
//! let mut ctx = CircuitContext::new(nodes.num_nodes());
//! lib.temperature(&ctx);
//! ctx.set_voltage(d, 1.0);
//! ctx.set_voltage(g, 1.0);
//!
//! let mut states = alloc.into_history(3);
//! let mut rhs = DVector::zeros(nodes.num_nodes() + 1);
//! let outcome = lib.load(&ctx, &mut states, &mut matrix, &mut rhs).unwrap();
//! assert!(outcome.noncon <= 1);
//! ```

pub mod device;
pub mod ekv;
pub mod error;
pub mod limit;
pub mod param;
pub mod stamp;

pub use device::{DeviceLibrary, DeviceModel};
pub use error::{Error, Result};
pub use param::{Access, Given, ParamInfo, ParamTable, Value, ValueKind};
pub use stamp::{ConvergenceResult, LoadOutcome, Offender, Stamp};
