pub mod evaluator;
pub mod loader;
pub mod scaler;
pub mod service;
pub mod trainer;
pub mod window;

pub use evaluator::{evaluate, Metrics};
pub use loader::{LoadMode, SeriesLoader};
pub use scaler::{MinMaxScaler, Scaler};
pub use service::{PredictionService, ServingContext};
pub use trainer::Trainer;
pub use window::{chronological_split, make_serving_window, make_training_windows, min_split_windows, WindowSet};
