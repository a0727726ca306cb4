pub mod prototypes;
