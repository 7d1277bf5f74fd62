//! Interview answers → required document set and client category.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::ClientCategory;

/// Number of closed (yes/no) questions; each one owns a document package.
pub const CLOSED_QUESTIONS: u8 = 14;

const CRYPTO_QUESTION: u8 = 10;
const MFO_QUESTION: u8 = 11;

const AFFIRMATIVE_TOKENS: [&str; 4] = ["так", "yes", "да", "+"];

const UBKI: (&str, bool) = ("Довідка з УБКІ", true);
const OK5: (&str, bool) = ("Довідка ОК-5", false);
const OK7: (&str, bool) = ("Довідка ОК-7", false);

type Package = &'static [(&'static str, bool)];

static PACKAGES: [Package; CLOSED_QUESTIONS as usize] = [
    // 1: military personnel
    &[
        UBKI,
        OK5,
        OK7,
        ("Довідка (форма №5) — підтвердження проходження служби", true),
        (
            "Фото військового квитка (всі сторінки, окрім сторінки зі зброєю)",
            true,
        ),
        ("Витяг з наказу про прийняття на посаду", true),
        ("Посвідчення УБД", false),
        ("Довідка (форма №6)", false),
        ("ЕЦП", false),
    ],
    // 2: spouse of military personnel
    &[
        UBKI,
        OK5,
        OK7,
        (
            "Довідка (форма №5) — підтвердження проходження служби військовослужбовцем",
            true,
        ),
        (
            "Фото військового квитка військовослужбовця (всі сторінки, окрім сторінки зі зброєю)",
            true,
        ),
        ("Витяг з наказу про прийняття на посаду", true),
        ("Свідоцтво про шлюб", true),
        ("Витяг з ДРАЦС про реєстрацію шлюбу", false),
        ("Посвідчення УБД", false),
        ("Довідка (форма №6)", false),
    ],
    // 3: internally displaced person
    &[
        UBKI,
        OK5,
        OK7,
        ("Скріншоти з застосунку «Дія», що підтверджують статус ВПО", true),
    ],
    // 4: property damage
    &[
        UBKI,
        OK5,
        OK7,
        (
            "Документи, що підтверджують пошкодження нерухомості: фотоматеріали або офіційні акти / довідки",
            true,
        ),
    ],
    // 5: disability
    &[UBKI, OK5, OK7, ("Фото пенсійного посвідчення", true)],
    // 6: disability of close relatives
    &[
        UBKI,
        OK5,
        OK7,
        ("Посвідчення або довідка про інвалідність родича", true),
    ],
    // 7: surgeries
    &[
        UBKI,
        OK5,
        OK7,
        (
            "Узагальнена медична картка / медичні виписки з печатками, що підтверджують проведення операцій",
            true,
        ),
    ],
    // 8: chronic diseases
    &[
        UBKI,
        OK5,
        OK7,
        (
            "Узагальнена медична картка / медичні виписки з печатками, що підтверджують захворювання",
            true,
        ),
    ],
    // 9: other circumstances
    &[
        UBKI,
        OK5,
        OK7,
        (
            "Документи у довільній формі, що підтверджують інші важливі обставини (пільги, життєві ситуації, фінансові труднощі тощо)",
            true,
        ),
    ],
    // 10: cryptocurrency loans
    &[
        UBKI,
        OK5,
        OK7,
        ("Договір позики у криптовалюті з особистого кабінету", true),
        ("Додаткові угоди (за наявності)", false),
    ],
    // 11: microfinance
    &[UBKI, OK5, OK7],
    // 12: banks
    &[UBKI, OK5, OK7],
    // 13: court cases
    &[
        UBKI,
        ("ЕЦП", false),
        OK5,
        OK7,
        (
            "Судові документи: ухвали, рішення, постанови, позовні заяви, інші процесуальні документи",
            true,
        ),
    ],
    // 14: enforcement proceedings
    &[
        UBKI,
        OK5,
        OK7,
        (
            "Скріншоти з застосунку «Дія», що підтверджують поточний стан виконавчого провадження та актуальну суму",
            true,
        ),
    ],
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredDocument {
    pub name: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Empty when no package was activated; documents are then underivable.
    pub documents: Vec<RequiredDocument>,
    pub category: ClientCategory,
}

pub fn is_affirmative(answer: &str) -> bool {
    let normalized = answer.trim().to_lowercase();
    AFFIRMATIVE_TOKENS.contains(&normalized.as_str())
}

/// Document package owned by a closed question (1-based).
pub fn package(question: u8) -> Option<Package> {
    if question == 0 {
        return None;
    }
    PACKAGES.get(usize::from(question - 1)).copied()
}

fn answered_yes(answers: &BTreeMap<u8, String>, question: u8) -> bool {
    answers
        .get(&question)
        .map(|answer| is_affirmative(answer))
        .unwrap_or(false)
}

pub fn resolve(answers: &BTreeMap<u8, String>) -> Resolution {
    Resolution {
        documents: required_documents(answers),
        category: categorize(answers),
    }
}

/// Union of activated packages in ascending question order.
pub fn required_documents(answers: &BTreeMap<u8, String>) -> Vec<RequiredDocument> {
    merge_packages(
        (1..=CLOSED_QUESTIONS)
            .filter(|question| answered_yes(answers, *question))
            .filter_map(package),
    )
}

/// The first occurrence of a name fixes its position; `required` is OR-ed
/// across every package that lists it.
fn merge_packages<I>(packages: I) -> Vec<RequiredDocument>
where
    I: IntoIterator<Item = Package>,
{
    let mut documents: Vec<RequiredDocument> = Vec::new();
    for entries in packages {
        for &(name, required) in entries {
            match documents.iter_mut().find(|doc| doc.name == name) {
                Some(existing) => existing.required |= required,
                None => documents.push(RequiredDocument { name, required }),
            }
        }
    }
    documents
}

pub fn categorize(answers: &BTreeMap<u8, String>) -> ClientCategory {
    if answered_yes(answers, CRYPTO_QUESTION) {
        ClientCategory::Crypto
    } else if answered_yes(answers, MFO_QUESTION) {
        ClientCategory::Mfo
    } else {
        ClientCategory::Bank
    }
}
