//! Template-driven local recipe generation, the last-resort fallback.
//! Total: every request yields a complete recipe. Template choice is
//! seeded by hashing the request fingerprint, so repeated requests render
//! the same recipe without any RNG state.

use super::{fingerprint, Recipe, RecipeRequest, RecipeStyle};

const TITLE_TEMPLATES: &[&str] = &[
    "Tropical {fruit} {style} Blend",
    "Island {fruit} {style} Delight",
    "Sunrise {fruit} {style} Cooler",
    "Golden {fruit} {style} Fusion",
];

/// Pick one of `choices` deterministically from `seed`.
fn pick<'a>(choices: &[&'a str], seed: &str) -> &'a str {
    let digest = blake3::hash(seed.as_bytes());
    let n = u64::from_le_bytes(
        digest.as_bytes()[..8]
            .try_into()
            .expect("blake3 digest is 32 bytes"),
    );
    choices[(n % choices.len() as u64) as usize]
}

fn capitalize(word: &str) -> String {
    let mut chars = word.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn style_label(style: RecipeStyle) -> &'static str {
    match style {
        RecipeStyle::Smoothie => "Smoothie",
        RecipeStyle::Detox => "Detox",
        RecipeStyle::Energy => "Energy",
        RecipeStyle::Immunity => "Immunity",
        RecipeStyle::Digestive => "Digestive",
        RecipeStyle::Beauty => "Beauty",
    }
}

fn style_ingredients(style: RecipeStyle) -> &'static [&'static str] {
    match style {
        RecipeStyle::Smoothie => &["1/2 cup Greek yogurt", "1 tsp vanilla extract"],
        RecipeStyle::Detox => &["1 tsp grated ginger", "Juice of half a lemon"],
        RecipeStyle::Energy => &["1 tbsp chia seeds", "1 tsp raw honey", "1/4 cup rolled oats"],
        RecipeStyle::Immunity => &["1 tbsp raw honey", "1/4 tsp turmeric", "1 tsp grated ginger"],
        RecipeStyle::Digestive => &["1/2 cup plain yogurt", "1 tsp fresh mint leaves"],
        RecipeStyle::Beauty => &["1 tbsp almond butter", "1 tsp flax seeds"],
    }
}

fn style_benefits(style: RecipeStyle) -> &'static [&'static str] {
    match style {
        RecipeStyle::Smoothie => &[
            "Balanced carbohydrates and protein for a satisfying snack",
            "Natural fruit sugars for a gentle lift",
        ],
        RecipeStyle::Detox => &[
            "Ginger and lemon support natural cleansing",
            "High water content helps flush toxins",
        ],
        RecipeStyle::Energy => &[
            "Chia seeds and oats provide slow-release energy",
            "Natural sugars deliver a quick pre-workout boost",
        ],
        RecipeStyle::Immunity => &[
            "Vitamin C strengthens immune defenses",
            "Turmeric and ginger add anti-inflammatory support",
        ],
        RecipeStyle::Digestive => &[
            "Yogurt cultures support healthy gut flora",
            "Mint soothes the digestive tract",
        ],
        RecipeStyle::Beauty => &[
            "Healthy fats support skin elasticity",
            "Antioxidants help protect against free radicals",
        ],
    }
}

fn is_animal_product(ingredient: &str) -> bool {
    let lower = ingredient.to_lowercase();
    lower.contains("yogurt") || lower.contains("milk") || lower.contains("honey")
}

/// Build a recipe from templates. Never fails.
pub fn generate_locally(request: &RecipeRequest) -> Recipe {
    let seed = fingerprint::generate_key(request);
    let fruit = capitalize(&request.fruit);
    let title = pick(TITLE_TEMPLATES, &seed)
        .replace("{fruit}", &fruit)
        .replace("{style}", style_label(request.style));

    let mut ingredients = vec![
        format!("1 cup fresh {}, chopped", request.fruit.trim().to_lowercase()),
        "1 ripe banana".to_string(),
        "1 cup coconut water".to_string(),
        "1/2 cup ice cubes".to_string(),
    ];
    ingredients.extend(style_ingredients(request.style).iter().map(|s| s.to_string()));
    if let Some(vegetables) = request.vegetables.as_deref().filter(|v| !v.trim().is_empty()) {
        ingredients.push(format!("1 handful {}", vegetables.trim().to_lowercase()));
    }

    let diet = request
        .dietary_restrictions
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let plant_based = diet
        .map(|d| {
            let lower = d.to_lowercase();
            lower.contains("vegan") || lower.contains("dairy")
        })
        .unwrap_or(false);
    if plant_based {
        ingredients.retain(|i| !is_animal_product(i));
        ingredients.push("1/2 cup coconut yogurt".to_string());
    }

    let instructions = vec![
        format!("Peel and chop the {} into chunks.", request.fruit.trim().to_lowercase()),
        "Add all ingredients to a high-speed blender.".to_string(),
        "Blend on high for 45-60 seconds until completely smooth.".to_string(),
        "Pour into chilled glasses and serve immediately.".to_string(),
    ];

    let mut benefits: Vec<String> = vec![format!(
        "{} provides vitamins, fiber and natural antioxidants",
        fruit
    )];
    benefits.extend(style_benefits(request.style).iter().map(|s| s.to_string()));

    let mut tips = vec![
        "Use frozen fruit for a thicker, colder blend.".to_string(),
        "Taste before serving and adjust sweetness with extra fruit.".to_string(),
    ];
    if let Some(diet) = diet {
        tips.push(format!("Prepared {diet}-friendly; double-check packaged ingredients."));
    }

    Recipe {
        title,
        ingredients,
        instructions,
        nutritional_benefits: benefits,
        tips,
        prep_time: "5 minutes".to_string(),
        servings: "2 servings".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(style: RecipeStyle) -> RecipeRequest {
        RecipeRequest {
            fruit: "mango".to_string(),
            style,
            vegetables: Some("spinach".to_string()),
            dietary_restrictions: None,
        }
    }

    #[test]
    fn every_style_yields_a_complete_recipe() {
        for style in RecipeStyle::ALL {
            let recipe = generate_locally(&request(style));
            assert!(!recipe.title.is_empty());
            assert!(recipe.ingredients.len() >= 5);
            assert!(!recipe.instructions.is_empty());
            assert!(!recipe.nutritional_benefits.is_empty());
            assert!(!recipe.tips.is_empty());
            assert!(!recipe.prep_time.is_empty());
            assert!(!recipe.servings.is_empty());
        }
    }

    #[test]
    fn generation_is_deterministic_per_request() {
        let req = request(RecipeStyle::Energy);
        assert_eq!(generate_locally(&req), generate_locally(&req));
    }

    #[test]
    fn vegan_request_swaps_out_dairy() {
        let mut req = request(RecipeStyle::Smoothie);
        req.dietary_restrictions = Some("vegan".to_string());
        let recipe = generate_locally(&req);
        assert!(!recipe
            .ingredients
            .iter()
            .any(|i| i.to_lowercase().contains("greek yogurt")));
        assert!(recipe.ingredients.iter().any(|i| i.contains("coconut yogurt")));
        assert!(recipe.tips.iter().any(|t| t.contains("vegan")));
    }

    #[test]
    fn vegetables_are_included_when_present() {
        let recipe = generate_locally(&request(RecipeStyle::Detox));
        assert!(recipe.ingredients.iter().any(|i| i.contains("spinach")));
    }
}
