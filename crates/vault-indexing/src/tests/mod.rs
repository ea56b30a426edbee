mod structural_scenarios;
mod support;
