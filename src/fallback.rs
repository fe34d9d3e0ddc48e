//! Network-free story content used whenever generation is unavailable,
//! fails, or yields nothing usable.

use rand::Rng;

use crate::{
    models::{Cardinality, Language, StoryItem, TITLE_MAX_CHARS},
    normalize::truncate_chars,
};

struct CannedStory {
    title: &'static str,
    story: &'static str,
    question: &'static str,
    options: [&'static str; 2],
    correct: usize,
}

const ENGLISH: &[CannedStory] = &[
    CannedStory {
        title: "Ravi's Piggy Bank",
        story: "Ravi got 100 rupees for his birthday. Instead of buying sweets right away, he put 50 rupees in his piggy bank. A month later he had enough to buy the cricket bat he wanted.",
        question: "Why could Ravi buy the cricket bat?",
        options: ["He saved part of his money", "He spent everything on sweets"],
        correct: 0,
    },
    CannedStory {
        title: "Meena Makes a Budget",
        story: "Meena wrote down her pocket money and everything she spent in a notebook. She saw she spent a lot on snacks. She cut back and saved 200 rupees by the end of the month.",
        question: "What helped Meena save money?",
        options: ["Buying more snacks", "Tracking her spending"],
        correct: 1,
    },
    CannedStory {
        title: "The Rainy Day Fund",
        story: "Arjun kept a small emergency fund from his salary every month. When his bicycle broke, he paid for the repair without borrowing from anyone.",
        question: "How did Arjun pay for the repair?",
        options: ["From his emergency fund", "With a loan from a friend"],
        correct: 0,
    },
];

const HINDI: &[CannedStory] = &[
    CannedStory {
        title: "रवि की गुल्लक",
        story: "रवि को जन्मदिन पर 100 रुपये मिले। उसने तुरंत मिठाई खरीदने की बजाय 50 रुपये गुल्लक में डाल दिए। एक महीने बाद उसने अपना पसंदीदा क्रिकेट बैट खरीद लिया।",
        question: "रवि क्रिकेट बैट क्यों खरीद पाया?",
        options: ["उसने पैसे बचाए", "उसने सारे पैसे मिठाई पर खर्च किए"],
        correct: 0,
    },
    CannedStory {
        title: "मीना का बजट",
        story: "मीना ने अपनी जेब खर्च और हर खर्च को एक कॉपी में लिखा। उसने देखा कि वह नाश्ते पर ज़्यादा खर्च करती है। उसने खर्च कम किया और महीने के अंत तक 200 रुपये बचाए।",
        question: "मीना को पैसे बचाने में किसने मदद की?",
        options: ["ज़्यादा नाश्ता खरीदना", "अपने खर्च का हिसाब रखना"],
        correct: 1,
    },
];

const TAMIL: &[CannedStory] = &[
    CannedStory {
        title: "ரவியின் உண்டியல்",
        story: "ரவிக்கு பிறந்தநாளில் 100 ரூபாய் கிடைத்தது. உடனே இனிப்பு வாங்காமல் 50 ரூபாயை உண்டியலில் போட்டான். ஒரு மாதம் கழித்து விரும்பிய கிரிக்கெட் மட்டையை வாங்கினான்.",
        question: "ரவி ஏன் கிரிக்கெட் மட்டையை வாங்க முடிந்தது?",
        options: ["அவன் பணம் சேமித்தான்", "எல்லா பணத்தையும் இனிப்புக்கு செலவு செய்தான்"],
        correct: 0,
    },
    CannedStory {
        title: "மீனாவின் பட்ஜெட்",
        story: "மீனா தன் கைச்செலவுகளை ஒரு நோட்டில் எழுதினாள். சிற்றுண்டிக்கு அதிகம் செலவு செய்வதை கண்டாள். செலவைக் குறைத்து மாத இறுதியில் 200 ரூபாய் சேமித்தாள்.",
        question: "மீனா பணம் சேமிக்க எது உதவியது?",
        options: ["அதிக சிற்றுண்டி வாங்குவது", "செலவுகளை கணக்கு வைப்பது"],
        correct: 1,
    },
];

fn canned(language: Language) -> &'static [CannedStory] {
    match language {
        Language::English => ENGLISH,
        Language::Hindi => HINDI,
        Language::Tamil => TAMIL,
    }
}

impl CannedStory {
    fn to_item(&self) -> StoryItem {
        StoryItem {
            title: self.title.to_string(),
            story: self.story.to_string(),
            question: self.question.to_string(),
            options: self.options.iter().map(|o| o.to_string()).collect(),
            correct: self.correct,
        }
    }
}

/// Terminal safety net: never fails and performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct FallbackProvider;

impl FallbackProvider {
    pub fn new() -> Self {
        Self
    }

    /// `count` items for the requested cardinality: a random canned story for
    /// single requests, topic-templated stories for batches.
    pub fn provide(&self, language: Language, topic: &str, cardinality: Cardinality) -> Vec<StoryItem> {
        match cardinality {
            Cardinality::Single => vec![self.canned_story(language)],
            Cardinality::Many(count) => (0..count).map(|i| self.templated(language, topic, i)).collect(),
        }
    }

    pub fn canned_story(&self, language: Language) -> StoryItem {
        let pool = canned(language);
        pool[rand::thread_rng().gen_range(0..pool.len())].to_item()
    }

    /// Deterministic item for slot `index`, used for batches and padding.
    pub fn templated(&self, language: Language, topic: &str, index: usize) -> StoryItem {
        let topic = if topic.trim().is_empty() { "saving money" } else { topic.trim() };
        let base = topic.split_whitespace().next().unwrap_or("Lesson");
        let title = truncate_chars(&format!("{} {}", base, index + 1), TITLE_MAX_CHARS);
        let variant = index % 2;

        let (story, question, options) = match (language, variant) {
            (Language::English, 0) => (
                format!("Once there was a child who learned about {topic}. They saved a little each week and noticed the difference."),
                "What was the best choice the child made?",
                ["Saved money regularly", "Spent all money immediately"],
            ),
            (Language::English, _) => (
                format!("Priya's family talked about {topic} at dinner. They decided to plan before spending and kept some money aside every month."),
                "What did Priya's family decide to do?",
                ["Plan before spending", "Buy whatever they liked"],
            ),
            (Language::Hindi, 0) => (
                format!("एक बच्चे ने {topic} के बारे में सीखा। उसने हर हफ्ते थोड़ा बचाया और फर्क देखा।"),
                "बच्चे ने सबसे अच्छा क्या किया?",
                ["नियमित रूप से पैसे बचाए", "सारे पैसे तुरंत खर्च किए"],
            ),
            (Language::Hindi, _) => (
                format!("प्रिया के परिवार ने खाने पर {topic} के बारे में बात की। उन्होंने खर्च से पहले योजना बनाई और हर महीने कुछ पैसे अलग रखे।"),
                "प्रिया के परिवार ने क्या तय किया?",
                ["खर्च से पहले योजना बनाना", "जो मन करे वह खरीदना"],
            ),
            (Language::Tamil, 0) => (
                format!("{topic} பற்றி ஒரு குழந்தை கற்றுக் கொண்டது. அது வாரம் சிறிது சேமித்தது மற்றும் மாற்றத்தை கண்டது."),
                "இந்தக் கதையில் சிறுவன் செய்த சிறந்த செயல் எது?",
                ["பணம் சேமித்தது", "அனைத்து பணத்தையும் உடனே செலவு செய்தது"],
            ),
            (Language::Tamil, _) => (
                format!("பிரியாவின் குடும்பம் இரவு உணவின் போது {topic} பற்றி பேசியது. செலவுக்கு முன் திட்டமிட்டு, ஒவ்வொரு மாதமும் கொஞ்சம் பணத்தை ஒதுக்கினர்."),
                "பிரியாவின் குடும்பம் என்ன முடிவு செய்தது?",
                ["செலவுக்கு முன் திட்டமிடுவது", "விரும்பியதை எல்லாம் வாங்குவது"],
            ),
        };

        StoryItem {
            title,
            story,
            question: question.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_canned_story_is_within_bounds() {
        for lang in [Language::English, Language::Hindi, Language::Tamil] {
            for story in canned(lang) {
                assert!(story.to_item().is_within_bounds(), "{lang:?}: {}", story.title);
            }
        }
    }

    #[test]
    fn single_fallback_comes_from_language_pool() {
        let provider = FallbackProvider::new();
        for lang in [Language::English, Language::Hindi, Language::Tamil] {
            let items = provider.provide(lang, "saving money", Cardinality::Single);
            assert_eq!(items.len(), 1);
            assert!(canned(lang).iter().any(|c| c.title == items[0].title));
        }
    }

    #[test]
    fn batch_fallback_templates_topic() {
        let items = FallbackProvider::new().provide(Language::English, "credit cards", Cardinality::Many(4));
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].title, "credit 1");
        assert_eq!(items[3].title, "credit 4");
        assert!(items[0].story.contains("credit cards"));
        assert!(items.iter().all(StoryItem::is_within_bounds));
    }

    #[test]
    fn templated_is_deterministic_and_bounded_for_long_topics() {
        let provider = FallbackProvider::new();
        let topic = "x".repeat(100);
        let a = provider.templated(Language::Tamil, &topic, 9);
        assert_eq!(a, provider.templated(Language::Tamil, &topic, 9));
        assert!(a.is_within_bounds());
        assert_eq!(a.title.chars().count(), TITLE_MAX_CHARS);
    }
}
