pub const QUESTION_COUNT: u8 = 15;

/// The free-text question whose answer is also pushed to the CRM deal.
pub const FREE_TEXT_QUESTION: u8 = 15;

static QUESTIONS: [&str; QUESTION_COUNT as usize] = [
    "Чи є ви військовослужбовцем?",
    "Чи є ви дружиною або чоловіком військовослужбовця?",
    "Чи маєте ви статус внутрішньо переміщеної особи (ВПО)?",
    "Чи було пошкоджено ваше нерухоме майно внаслідок бойових дій?",
    "Чи маєте ви інвалідність?",
    "Чи мають інвалідність ваші близькі родичі?",
    "Чи переносили ви операції?",
    "Чи маєте ви хронічні захворювання?",
    "Чи є інші важливі обставини (пільги, життєві ситуації, фінансові труднощі)?",
    "Чи маєте ви борги за договорами позики у криптовалюті?",
    "Чи маєте ви борги перед МФО (мікрофінансовими організаціями)?",
    "Чи маєте ви борги перед банками?",
    "Чи є у вас судові справи щодо боргів?",
    "Чи відкрито щодо вас виконавче провадження?",
    "Опишіть коротко вашу ситуацію: кому, скільки і з якого часу ви винні.",
];

pub fn question_text(number: u8) -> Option<&'static str> {
    if number == 0 {
        return None;
    }
    QUESTIONS.get(usize::from(number - 1)).copied()
}

/// Questions answered with yes or no.
pub fn is_closed(number: u8) -> bool {
    (1..FREE_TEXT_QUESTION).contains(&number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_is_one_based() {
        assert!(question_text(0).is_none());
        assert!(question_text(16).is_none());
        assert!(question_text(15).unwrap().starts_with("Опишіть"));
        assert!(is_closed(14));
        assert!(!is_closed(15));
    }
}
