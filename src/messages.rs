//! User-facing texts for machine replies and stage notifications.

use crate::crm::StageDisplay;
use crate::models::Conference;
use crate::onboarding::questions::{is_closed, QUESTION_COUNT};
use crate::onboarding::validate::NameError;
use crate::onboarding::Reply;

pub const MAIN_MENU_BUTTON: &str = "🏠 Головне меню";
pub const START_REGISTRATION_BUTTON: &str = "Розпочати реєстрацію";

pub fn render(reply: &Reply) -> String {
    match reply {
        Reply::AskName => {
            "Вітаємо! Введіть, будь ласка, ваше повне ім'я (прізвище та ім'я).".to_string()
        }
        Reply::InvalidName(NameError::Empty) => "Будь ласка, введіть ваше ім'я.".to_string(),
        Reply::InvalidName(NameError::TooShort) => {
            "Введіть щонайменше прізвище та ім'я через пробіл.".to_string()
        }
        Reply::InvalidName(NameError::InvalidCharacters) => {
            "Ім'я може містити лише літери, апостроф та дефіс.".to_string()
        }
        Reply::InvalidName(NameError::TooLong) => {
            "Ім'я занадто довге. Введіть лише прізвище, ім'я та по батькові.".to_string()
        }
        Reply::AskPhone => {
            "Дякуємо! Тепер введіть номер телефону, вказаний у договорі (наприклад, 0501234567)."
                .to_string()
        }
        Reply::InvalidPhone => {
            "Невірний формат номера. Введіть номер у форматі 0501234567 або +380501234567."
                .to_string()
        }
        Reply::CaseNotFound => "❌ Ми не знайшли вашу справу за цим номером. \
             Зверніться, будь ласка, до вашого менеджера."
            .to_string(),
        Reply::RegistrationFailed => {
            "❌ Помилка при збереженні даних. Спробуйте пізніше.".to_string()
        }
        Reply::AlreadyRegistered { full_name } => {
            format!("{full_name}, ви вже зареєстровані! Використовуйте меню для навігації.")
        }
        Reply::Registered { full_name } => {
            format!("✅ {full_name}, реєстрацію завершено! Вашу справу знайдено.")
        }
        Reply::InterviewIntro => {
            "📝 Дайте, будь ласка, відповіді на кілька запитань. \
             На питання 1-14 відповідайте «так» або «ні»."
                .to_string()
        }
        Reply::Question { number, text } => {
            let mut rendered = format!("❓ Питання {number}/{QUESTION_COUNT}:\n\n{text}");
            if is_closed(*number) {
                rendered.push_str("\n\nВідповідь: «так» або «ні»");
            }
            rendered
        }
        Reply::InterviewComplete { category } => {
            format!("✅ Анкету заповнено. Категорія: {}.", category.label())
        }
        Reply::DocumentsRequired(documents) => {
            let mut text = String::from("📂 Необхідні документи:\n\n");
            for (index, document) in documents.iter().enumerate() {
                let marker = if document.required { "⭐" } else { "📋" };
                text.push_str(&format!("{}. {marker} {}\n", index + 1, document.name));
            }
            text.push_str("\n⭐ обов'язковий, 📋 за наявності.\nНадсилайте документи по черзі, після завершення натисніть /done.");
            text
        }
        Reply::DocumentsUnderivable => {
            "Не вдалося визначити необхідні документи. Зверніться до менеджера.".to_string()
        }
        Reply::AwaitingDocuments => {
            "Надішліть документ файлом або фото. Коли завершите, натисніть /done.".to_string()
        }
        Reply::DocumentSaved { file_name } => format!("✅ Документ «{file_name}» збережено."),
        Reply::DocumentUploadFailed { file_name } => {
            format!("❌ Не вдалося завантажити «{file_name}». Спробуйте ще раз.")
        }
        Reply::ArchiveUnavailable => {
            "Помилка: папку для ваших документів ще не створено. Зверніться до менеджера."
                .to_string()
        }
        Reply::NotCollectingDocuments => {
            "Зараз документи не приймаються. Спочатку заповніть анкету (/questionnaire)."
                .to_string()
        }
        Reply::Completed { documents } => {
            format!("🎉 Дякуємо! Отримано документів: {documents}. Ми повідомимо вас про зміни у справі.")
        }
        Reply::Cancelled => "Дію скасовано. Натисніть /start, щоб почати знову.".to_string(),
        Reply::MainMenu => format!(
            "{MAIN_MENU_BUTTON}\n\n/questionnaire анкета\n/roadmap дорожня карта\n/conferences конференції"
        ),
        Reply::NotRegistered => "Будь ласка, спочатку пройдіть реєстрацію (/start).".to_string(),
        Reply::Roadmap {
            stage,
            description,
            steps,
        } => {
            let mut text = String::from("🗺️ ВАША СПРАВА\n\nПоточний етап: ");
            text.push_str(stage.as_deref().unwrap_or("Невідома стадія"));
            text.push('\n');
            if !description.is_empty() {
                text.push_str(description);
                text.push('\n');
            }
            text.push_str("\n📍 ДОРОЖНЯ КАРТА:\n");
            for step in steps {
                if step.current {
                    text.push_str(&format!("▶️ {} (ви тут)\n", step.label));
                } else {
                    text.push_str(&format!("   {}\n", step.label));
                }
            }
            text
        }
        Reply::ConferencesToggled { opted_out: true } => {
            "🔕 Ви більше не отримуватимете запрошення на конференції.".to_string()
        }
        Reply::ConferencesToggled { opted_out: false } => {
            "🔔 Запрошення на конференції увімкнено.".to_string()
        }
    }
}

pub const CONFERENCE_REGISTER_BUTTON: &str = "✅ Зареєструватися";
pub const CONFERENCE_DECLINE_BUTTON: &str = "❌ Відхилити";
pub const CONFERENCE_DECLINED: &str = "Дякуємо за відповідь!";
pub const CONFERENCE_NOT_FOUND: &str = "Конференцію не знайдено або її вже скасовано.";

pub fn conference_header(upcoming: usize) -> String {
    if upcoming == 0 {
        return "Наразі немає запланованих конференцій.\nМи повідомимо вас, коли з'явиться нова!"
            .to_string();
    }
    "📅 ЗАПЛАНОВАНІ КОНФЕРЕНЦІЇ:\n\n/conferences_off вимкнути запрошення".to_string()
}

/// One conference with its capacity; `registered` marks the reader's own
/// registration.
pub fn conference_card(conference: &Conference, participants: i64, registered: bool) -> String {
    let mut text = format!(
        "🎤 {}\n🗓 {}\n🔗 {}\n",
        conference.title,
        conference.starts_at.format("%d.%m.%Y о %H:%M"),
        conference.join_link
    );
    if let Some(description) = &conference.description {
        text.push_str(description);
        text.push('\n');
    }
    text.push_str(&format!(
        "\n👥 Зареєстровано: {participants}/{}",
        conference.max_participants
    ));
    if registered {
        text.push_str("\n✅ Ви вже зареєстровані");
    }
    text
}

pub fn conference_registered(conference: Option<&Conference>) -> String {
    match conference {
        Some(conference) => format!(
            "✅ Ви зареєстровані на конференцію «{}»!\n🗓 {}\n🔗 {}",
            conference.title,
            conference.starts_at.format("%d.%m.%Y о %H:%M"),
            conference.join_link
        ),
        None => "✅ Ви зареєстровані на конференцію!".to_string(),
    }
}

pub fn stage_updated(display: &StageDisplay<'_>) -> String {
    let mut text = format!("📢 Оновлення по вашій справі!\n\nНовий етап: {}", display.label);
    if !display.description.is_empty() {
        text.push_str("\n\n");
        text.push_str(display.description);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::{map_stage, roadmap};
    use crate::requirements::RequiredDocument;

    #[test]
    fn document_list_marks_required_entries() {
        let text = render(&Reply::DocumentsRequired(vec![
            RequiredDocument {
                name: "Паспорт",
                required: true,
            },
            RequiredDocument {
                name: "Довідка",
                required: false,
            },
        ]));
        assert!(text.contains("1. ⭐ Паспорт"));
        assert!(text.contains("2. 📋 Довідка"));
    }

    #[test]
    fn closed_questions_carry_a_yes_no_hint() {
        let closed = render(&Reply::Question {
            number: 3,
            text: "Чи маєте ви статус ВПО?",
        });
        assert!(closed.starts_with("❓ Питання 3/15:"));
        assert!(closed.ends_with("«так» або «ні»"));

        let free = render(&Reply::Question {
            number: 15,
            text: "Опишіть ситуацію.",
        });
        assert!(free.ends_with("Опишіть ситуацію."));
    }

    #[test]
    fn roadmap_points_at_current_stage() {
        let text = render(&Reply::Roadmap {
            stage: Some("🛡️ Ведемо переговори".into()),
            description: "",
            steps: roadmap(Some("C7:UC_DSTO0P")),
        });
        assert!(text.contains("▶️ 🛡️ Ведемо переговори (ви тут)"));
        assert!(text.contains("   🏆 Справу завершено"));
    }

    #[test]
    fn conference_card_shows_capacity_and_registration() {
        let now = chrono::NaiveDate::from_ymd_opt(2026, 11, 5)
            .and_then(|date| date.and_hms_opt(18, 30, 0))
            .unwrap();
        let conference = Conference {
            id: uuid::Uuid::new_v4(),
            title: "Правовий вебінар".into(),
            description: None,
            starts_at: now,
            join_link: "https://zoom.us/j/1".into(),
            max_participants: 50,
            is_active: true,
            created_at: now,
        };
        let text = conference_card(&conference, 7, false);
        assert!(text.contains("05.11.2026 о 18:30"));
        assert!(text.ends_with("👥 Зареєстровано: 7/50"));
        assert!(conference_card(&conference, 8, true).ends_with("✅ Ви вже зареєстровані"));
        assert!(conference_registered(Some(&conference)).contains("«Правовий вебінар»"));
        assert!(conference_header(0).starts_with("Наразі немає"));
        assert!(conference_header(1).starts_with("📅"));
    }

    #[test]
    fn stage_notice_includes_description() {
        let text = stage_updated(&map_stage("C7:WON"));
        assert!(text.contains("🏆 Справу завершено"));
        assert!(text.ends_with("Перемога!"));
        assert!(!stage_updated(&map_stage("C9:X")).ends_with('\n'));
    }
}
