//! Canned questions and the semantic model setup guide.

use crate::config::CortexConfig;

/// Quick-start questions offered above the chat input.
pub const EXAMPLE_QUESTIONS: [&str; 6] = [
    "Show me the current utilization dashboard",
    "What are our utilization trends over the last 3 months?",
    "Which consultants have the highest billable rates?",
    "Show me project performance for this quarter",
    "Who is overallocated in the next 2 weeks?",
    "Compare our forecast accuracy by consultant",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleCategory {
    pub title: &'static str,
    pub questions: &'static [&'static str],
}

pub const SAMPLE_CATEGORIES: [SampleCategory; 5] = [
    SampleCategory {
        title: "Dashboard & Overview",
        questions: &[
            "Show me the current utilization dashboard",
            "What's our overall capacity utilization this week?",
            "Give me a summary of key utilization metrics",
            "How many active consultants do we have?",
        ],
    },
    SampleCategory {
        title: "Trends & Analysis",
        questions: &[
            "Show utilization trends for the last 3 months",
            "How has our billable rate changed over time?",
            "What's the trend in our forecast accuracy?",
            "Compare this quarter vs last quarter utilization",
        ],
    },
    SampleCategory {
        title: "People & Capacity",
        questions: &[
            "Which consultants are overallocated next week?",
            "Who has the highest billable rates?",
            "Show me individual consultant workloads",
            "Which team members have available capacity?",
        ],
    },
    SampleCategory {
        title: "Projects & Performance",
        questions: &[
            "Show project performance metrics",
            "Which projects have the highest revenue?",
            "What's our project efficiency by client?",
            "Show me projects with low billable rates",
        ],
    },
    SampleCategory {
        title: "Forecasting",
        questions: &[
            "How accurate are our forecasts?",
            "Compare forecast vs actual hours",
            "Which consultants have the most variance in forecasting?",
            "Show forecast accuracy trends",
        ],
    },
];

/// Flattened `(category, question)` pairs, in display order.
pub fn all_samples() -> impl Iterator<Item = (&'static str, &'static str)> {
    SAMPLE_CATEGORIES
        .iter()
        .flat_map(|c| c.questions.iter().map(move |q| (c.title, *q)))
}

/// SQL to create the stage, upload the semantic model, and verify it.
pub fn setup_sql(cortex: &CortexConfig) -> String {
    let stage = format!("{}.{}.{}", cortex.database, cortex.schema, cortex.stage);
    format!(
        "-- Create stage if it doesn't exist\n\
         CREATE STAGE IF NOT EXISTS {stage};\n\
         \n\
         -- Upload your semantic model file\n\
         PUT file://path/to/{model} @{stage};\n\
         \n\
         -- Verify the file is uploaded\n\
         LIST @{stage};\n",
        stage = stage,
        model = cortex.semantic_model,
    )
}

pub const PREREQUISITES: [&str; 6] = [
    "Account with Cortex Analyst enabled",
    "Role and warehouse permissions for the analyst scope",
    "Database and schema access",
    "Semantic model file uploaded to a stage",
    "Stage readable by the configured role",
    "SELECT on the tables the model references",
];
