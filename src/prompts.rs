pub const DIAGNOSIS_SYSTEM: &str = include_str!("../data/prompts/diagnosis_system.txt");
pub const DIAGNOSIS_USER: &str = include_str!("../data/prompts/diagnosis_user.txt");

/// Disease label the model is told to use for a plant with no visible disease.
pub const HEALTHY_LABEL: &str = "Sağlıklı Bitki";

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

/// System instruction with the healthy sentinel filled in.
pub fn diagnosis_system() -> String {
    render(DIAGNOSIS_SYSTEM, &[("healthy_label", HEALTHY_LABEL)])
}
