pub mod base;
pub mod buffer;
pub mod handles;
pub mod net_graph;
pub mod pointer;
pub mod raster;
pub mod sim_control;
pub mod slider;
pub mod traits;
pub mod types;
pub mod value;
pub mod xy_value;

// Re-export commonly used types
pub use base::ComponentBase;
pub use buffer::SampleBuffer;
pub use handles::{GraphHandles, GraphSlot};
pub use net_graph::NetGraph;
pub use pointer::Pointer;
pub use raster::Raster;
pub use sim_control::SimControl;
pub use slider::Slider;
pub use traits::{AttachContext, VizComponent};
pub use types::{ComponentKind, Sample};
pub use value::Value;
pub use xy_value::XYValue;
