//! The built-in question set.

use chrono::NaiveDate;

use super::model::{Category, Choice, DateRange, InputKind, Phase, Question};

pub(super) fn phases() -> Vec<Phase> {
    vec![essentials(), about_you(), deeper()]
}

fn essentials() -> Phase {
    Phase::new(
        "essentials",
        "Essentials",
        0,
        vec![
            Question::new(
                "profile_photos",
                "Let's start with your photos. Add up to six that show the real you.",
                InputKind::MultiImage { max_images: 6 },
                Category::Photos,
            )
            .points(20)
            .required(),
        ],
    )
}

fn about_you() -> Phase {
    Phase::new(
        "about_you",
        "About You",
        20,
        vec![
            Question::new(
                "headline",
                "If your profile had a headline, what would it say?",
                InputKind::ShortText,
                Category::Basics,
            )
            .points(10)
            .required(),
            Question::new(
                "bio",
                "Tell people a little about yourself.",
                InputKind::LongText,
                Category::Basics,
            )
            .points(15)
            .required(),
            Question::new(
                "relationship_goals",
                "What are you hoping to find here?",
                InputKind::SingleSelect {
                    options: vec![
                        Choice::new("friendship", "New friends"),
                        Choice::new("networking", "Professional connections"),
                        Choice::new("dating", "Something romantic"),
                        Choice::new("open", "Open to anything"),
                    ],
                },
                Category::Intentions,
            )
            .points(10)
            .required(),
            Question::new(
                "interests",
                "Pick the things you could talk about for hours.",
                InputKind::MultiSelectCards {
                    cards: vec![
                        Choice::new("music", "Music"),
                        Choice::new("travel", "Travel"),
                        Choice::new("food", "Food & cooking"),
                        Choice::new("sports", "Sports"),
                        Choice::new("tech", "Technology"),
                        Choice::new("art", "Art & design"),
                        Choice::new("books", "Books"),
                        Choice::new("outdoors", "The outdoors"),
                    ],
                },
                Category::Interests,
            )
            .points(15)
            .required(),
            Question::new(
                "occupation",
                "What do you do for work?",
                InputKind::ShortText,
                Category::Basics,
            )
            .points(5),
            Question::new(
                "education",
                "What's your highest level of education?",
                InputKind::SingleSelect {
                    options: vec![
                        Choice::new("high_school", "High school"),
                        Choice::new("trade", "Trade school"),
                        Choice::new("bachelors", "Bachelor's degree"),
                        Choice::new("masters", "Master's degree"),
                        Choice::new("doctorate", "Doctorate"),
                    ],
                },
                Category::Basics,
            )
            .points(5),
        ],
    )
}

fn deeper() -> Phase {
    Phase::new(
        "deeper",
        "Going Deeper",
        60,
        vec![
            Question::new(
                "personality_traits",
                "Which of these sound most like you?",
                InputKind::MultiSelectCards {
                    cards: vec![
                        Choice::new("adventurous", "Adventurous")
                            .with_detail("Always up for something new"),
                        Choice::new("calm", "Calm").with_detail("Steady under pressure"),
                        Choice::new("funny", "Funny").with_detail("Quick with a joke"),
                        Choice::new("thoughtful", "Thoughtful")
                            .with_detail("Remembers the small things"),
                        Choice::new("ambitious", "Ambitious").with_detail("Big plans, bigger goals"),
                        Choice::new("creative", "Creative").with_detail("Makes things for fun"),
                    ],
                },
                Category::Personality,
            )
            .points(10)
            .required(),
            Question::new(
                "core_values",
                "What matters most to you in the people around you?",
                InputKind::MultiSelectCards {
                    cards: vec![
                        Choice::new("honesty", "Honesty"),
                        Choice::new("kindness", "Kindness"),
                        Choice::new("loyalty", "Loyalty"),
                        Choice::new("curiosity", "Curiosity"),
                        Choice::new("humor", "A sense of humor"),
                        Choice::new("growth", "Personal growth"),
                    ],
                },
                Category::Personality,
            )
            .points(10)
            .required(),
            Question::new(
                "drinking",
                "How do you feel about drinking?",
                InputKind::SingleSelect { options: frequency_options() },
                Category::Lifestyle,
            )
            .points(5),
            Question::new(
                "smoking",
                "And smoking?",
                InputKind::SingleSelect { options: frequency_options() },
                Category::Lifestyle,
            )
            .points(5),
            Question::new(
                "exercise",
                "How often do you work out?",
                InputKind::SingleSelect {
                    options: vec![
                        Choice::new("never", "Never"),
                        Choice::new("sometimes", "Sometimes"),
                        Choice::new("weekly", "A few times a week"),
                        Choice::new("daily", "Every day"),
                    ],
                },
                Category::Lifestyle,
            )
            .points(5),
            Question::new(
                "languages",
                "Which languages do you speak?",
                InputKind::MultiSelectCards {
                    cards: vec![
                        Choice::new("en", "English"),
                        Choice::new("es", "Spanish"),
                        Choice::new("fr", "French"),
                        Choice::new("de", "German"),
                        Choice::new("pt", "Portuguese"),
                        Choice::new("zh", "Mandarin"),
                        Choice::new("hi", "Hindi"),
                        Choice::new("ar", "Arabic"),
                    ],
                },
                Category::Lifestyle,
            )
            .points(5),
            Question::new(
                "ideal_weekend",
                "Describe your ideal weekend.",
                InputKind::LongText,
                Category::Interests,
            )
            .points(10)
            .depends_on("interests"),
            Question::new(
                "favorite_places",
                "Share a few photos of places you love.",
                InputKind::MultiImage { max_images: 4 },
                Category::Photos,
            )
            .points(10),
            Question::new(
                "next_adventure",
                "When is your next big trip or adventure?",
                InputKind::Date {
                    range: Some(DateRange {
                        min: NaiveDate::from_ymd_opt(2000, 1, 1),
                        max: NaiveDate::from_ymd_opt(2100, 12, 31),
                    }),
                },
                Category::Interests,
            )
            .points(5),
            Question::new(
                "life_story",
                "Tell us a story that says something about who you are.",
                InputKind::FreeFormStory,
                Category::Story,
            )
            .points(20)
            .depends_on("bio"),
            Question::new(
                "cover_photo",
                "Finally, pick a cover photo for your profile.",
                InputKind::Image,
                Category::Photos,
            )
            .points(5),
        ],
    )
}

fn frequency_options() -> Vec<Choice> {
    vec![
        Choice::new("never", "Never"),
        Choice::new("rarely", "Rarely"),
        Choice::new("socially", "Socially"),
        Choice::new("often", "Often"),
    ]
}
