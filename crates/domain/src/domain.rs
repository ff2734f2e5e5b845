pub mod article;
pub mod embedding;
pub mod recommendation;
pub mod similarity;
