/*!
 * Tests for language code utilities
 */

use subflow::language_utils::{is_auto, language_display_name, normalize_to_part2t, validate_language_code};

#[test]
fn test_normalizeToPart2t_withTwoLetterCodes_shouldExpand() {
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("fa").unwrap(), "fas");
    assert_eq!(normalize_to_part2t(" JA ").unwrap(), "jpn");
}

#[test]
fn test_normalizeToPart2t_withBibliographicCodes_shouldMapToTerminology() {
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("chi").unwrap(), "zho");
    assert_eq!(normalize_to_part2t("deu").unwrap(), "deu");
}

#[test]
fn test_validateLanguageCode_withAuto_shouldFail() {
    assert!(is_auto("auto"));
    assert!(validate_language_code("auto").is_err());
}

#[test]
fn test_languageDisplayName_withThreeLetterCode_shouldResolve() {
    assert_eq!(language_display_name("spa"), "Spanish");
    assert_eq!(language_display_name("per"), "Persian");
}
