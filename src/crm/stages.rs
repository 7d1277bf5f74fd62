use serde::Serialize;

const STRATEGY: &str = "🎯 Стратегію розроблено";
const NEGOTIATING: &str = "🛡️ Ведемо переговори";
const FIRST_RESULTS: &str = "✅ Є перші результати";
const FINAL_STAGE: &str = "⚡ Фінальний етап";
const PARTICIPATION: &str = "💬 Потрібна ваша участь";
const WON: &str = "🏆 Справу завершено";
const CLOSED: &str = "📋 Справу закрито";

static STAGE_LABELS: [(&str, &str); 9] = [
    ("C7:NEW", STRATEGY),
    ("C7:UC_60XKB5", STRATEGY),
    ("C7:UC_DSTO0P", NEGOTIATING),
    ("C7:PREPARATION", FIRST_RESULTS),
    ("C7:EXECUTING", FINAL_STAGE),
    ("C7:1", FINAL_STAGE),
    ("C7:2", PARTICIPATION),
    ("C7:WON", WON),
    ("C7:LOSE", CLOSED),
];

static STAGE_DESCRIPTIONS: [(&str, &str); 7] = [
    (STRATEGY, "Клієнт прийшов → ми вивчили ситуацію → є план"),
    (NEGOTIATING, "Взяли в роботу = почали комунікацію з кредиторами"),
    (FIRST_RESULTS, "Закрили першого кредитора — є чим похвалитись"),
    (FINAL_STAGE, "Активна робота або очікування відповідей"),
    (WON, "Перемога!"),
    (PARTICIPATION, "Спеціальний статус: потрібна ваша участь"),
    (CLOSED, "Справу закрито"),
];

static ROADMAP: [&str; 5] = [STRATEGY, NEGOTIATING, FIRST_RESULTS, FINAL_STAGE, WON];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageDisplay<'a> {
    pub label: &'a str,
    pub description: &'static str,
}

/// Unknown codes pass through as the label with an empty description.
pub fn map_stage(code: &str) -> StageDisplay<'_> {
    let label = STAGE_LABELS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, label)| *label);

    match label {
        Some(label) => StageDisplay {
            label,
            description: describe(label),
        },
        None => StageDisplay {
            label: code,
            description: "",
        },
    }
}

fn describe(label: &str) -> &'static str {
    STAGE_DESCRIPTIONS
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, description)| *description)
        .unwrap_or("")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoadmapStep {
    pub label: &'static str,
    pub current: bool,
}

pub fn roadmap(current_code: Option<&str>) -> Vec<RoadmapStep> {
    let current = current_code.map(|code| map_stage(code).label);
    ROADMAP
        .iter()
        .map(|&label| RoadmapStep {
            label,
            current: current == Some(label),
        })
        .collect()
}
