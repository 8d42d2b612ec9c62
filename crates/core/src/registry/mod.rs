pub mod model_selection;
pub mod resolver;
