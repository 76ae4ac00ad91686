pub mod rank;
pub mod roulette;
pub mod selection_strategy;
pub mod tournament;

pub use rank::RankBasedSelection;
pub use roulette::RouletteWheelSelection;
pub use selection_strategy::SelectionStrategy;
pub use tournament::TournamentSelection;
