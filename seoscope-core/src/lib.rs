pub mod audit;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod run;
pub mod seo;
