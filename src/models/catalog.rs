//! The campaign catalog: one registry entry per reporting category.
//!
//! Every category shares the same campaign/submission/pictures table shape;
//! only the category-specific metric columns differ. Instead of one
//! model/handler per category, everything is driven off `CatalogEntry`:
//! the URL slug, the table names, the typed field list and the dashboard
//! preview columns. Adding a category means adding a migration and one
//! entry here.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Text,
    Bool,
    Date,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn int(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Int }
}

const fn float(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Float }
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Text }
}

const fn boolean(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Bool }
}

const fn date(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Date }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CampaignKind {
    StateOfTheFlock,
    SoulWinning,
    ServantsArmedTrained,
    Antibrutish,
    HearingSeeing,
    HonourYourProphet,
    BasontaProliferation,
    IntimateCounseling,
    Technology,
    SheperdingControl,
    Multiplication,
    Understanding,
    SheepSeeking,
    Testimony,
    Telepastoring,
    GatheringBus,
    OrganisedCreativeArts,
    Tangerine,
    SwollenSunday,
    SundayManagement,
    Equipment,
}

pub struct CatalogEntry {
    pub kind: CampaignKind,
    /// URL path segment, also the tag stored in assignment rows.
    pub slug: &'static str,
    pub display_name: &'static str,
    pub campaign_table: &'static str,
    pub submission_table: &'static str,
    /// None for categories without picture attachments.
    pub file_table: Option<&'static str>,
    pub fields: &'static [FieldSpec],
    /// Columns surfaced in the dashboard recent-submission preview.
    pub preview_fields: &'static [&'static str],
}

pub static CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        kind: CampaignKind::StateOfTheFlock,
        slug: "state-of-flock",
        display_name: "State of the Flock",
        campaign_table: "campaign_sof",
        submission_table: "submission_sof",
        file_table: None,
        fields: &[
            int("total_membership"),
            int("lost"),
            int("stable"),
            int("unstable"),
        ],
        preview_fields: &["total_membership", "stable"],
    },
    CatalogEntry {
        kind: CampaignKind::SoulWinning,
        slug: "soul-winning",
        display_name: "Soul Winning",
        campaign_table: "campaign_swc",
        submission_table: "submission_swc",
        file_table: Some("submission_swc_files"),
        fields: &[
            int("no_of_crusades"),
            int("no_of_massive_organised_outreaches"),
            int("no_of_dance_outreach"),
            int("no_of_souls_won"),
            int("no_of_missionaries_in_training"),
            int("no_of_missionaries_sent"),
        ],
        preview_fields: &["no_of_souls_won", "no_of_crusades"],
    },
    CatalogEntry {
        kind: CampaignKind::ServantsArmedTrained,
        slug: "servants-armed-trained",
        display_name: "Servants Armed and Trained",
        campaign_table: "campaign_sat",
        submission_table: "submission_sat",
        file_table: Some("submission_sat_files"),
        fields: &[
            int("no_of_teachings_done_by_pastor"),
            int("average_attendance_during_meetings_by_pastor"),
            int("no_of_leaders_who_have_makarios"),
            int("no_of_leaders_who_own_dakes_bible"),
            int("no_of_leaders_who_own_thompson_chain"),
            int("no_of_pose_certified_leaders"),
            int("no_of_leaders_in_iptp_training"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::Antibrutish,
        slug: "antibrutish",
        display_name: "Antibrutish",
        campaign_table: "campaign_ant",
        submission_table: "submission_ant",
        file_table: Some("submission_ant_files"),
        fields: &[
            text("type_of_prayer"),
            float("hours_prayed"),
            int("number_of_people_who_prayed"),
        ],
        preview_fields: &["type_of_prayer", "hours_prayed"],
    },
    CatalogEntry {
        kind: CampaignKind::HearingSeeing,
        slug: "hearing-seeing",
        display_name: "Hearing and Seeing",
        campaign_table: "campaign_hs",
        submission_table: "submission_hs",
        file_table: None,
        fields: &[
            int("avg_number_of_leaders_that_join_flow"),
            int("no_of_people_subscribed_bishop_dag_youtube"),
            int("no_of_people_subscribed_es_joys_podcast"),
            int("no_of_messages_listened_to"),
            text("titles_of_messages_listened_to"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::HonourYourProphet,
        slug: "honour-your-prophet",
        display_name: "Honour Your Prophet",
        campaign_table: "campaign_hyp",
        submission_table: "submission_hyp",
        file_table: Some("submission_hyp_files"),
        fields: &[
            int("no_of_people_who_honoured_with_offering"),
            text("activities_done_to_honour_prophet"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::BasontaProliferation,
        slug: "basonta-proliferation",
        display_name: "Basonta Proliferation",
        campaign_table: "campaign_bsp",
        submission_table: "submission_bsp",
        file_table: Some("submission_bsp_files"),
        fields: &[
            int("no_of_bacentas_at_beginning_of_month"),
            int("current_number_of_bacentas"),
            int("no_of_new_bacentas"),
            int("no_of_leaders_who_are_leavers"),
            int("no_of_replacements_new_leaders_available"),
            int("average_no_of_people_at_bacenta_meeting"),
            int("no_of_basontas"),
            int("average_number_of_people_at_basonta_meetings"),
            int("avg_no_of_members_saturday_service"),
            int("avg_no_of_members_sunday_service"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::IntimateCounseling,
        slug: "intimate-counseling",
        display_name: "Intimate Counseling",
        campaign_table: "campaign_inc",
        submission_table: "submission_inc",
        file_table: None,
        fields: &[
            int("total_number_of_members"),
            int("total_number_of_members_counseled"),
            int("no_of_members_counseled_via_calls"),
            int("no_of_members_counseled_in_person"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::Technology,
        slug: "technology",
        display_name: "Technology",
        campaign_table: "campaign_tech",
        submission_table: "submission_tech",
        file_table: Some("submission_tech_files"),
        fields: &[text("list_of_equipments_in_church")],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::SheperdingControl,
        slug: "sheperding-control",
        display_name: "Sheperding Control",
        campaign_table: "campaign_shc",
        submission_table: "submission_shc",
        file_table: None,
        fields: &[
            int("current_no_of_leaders"),
            int("no_of_cos"),
            int("no_of_bos"),
            int("no_of_bls"),
            int("no_of_fls"),
            int("no_of_potential_leaders"),
            int("no_of_leaders_who_have_been_sacked"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::Multiplication,
        slug: "multiplication",
        display_name: "Multiplication",
        campaign_table: "campaign_mult",
        submission_table: "submission_mult",
        file_table: Some("submission_mult_files"),
        fields: &[
            int("no_of_outreaches"),
            text("type_of_outreaches"),
            int("no_of_members_who_came_from_outreaches_to_church"),
            int("no_of_invites_done"),
            int("avg_number_of_people_invited_per_week"),
        ],
        preview_fields: &["no_of_outreaches"],
    },
    CatalogEntry {
        kind: CampaignKind::Understanding,
        slug: "understanding",
        display_name: "Understanding",
        campaign_table: "campaign_uc",
        submission_table: "submission_uc",
        file_table: Some("submission_uc_files"),
        fields: &[
            text("lay_school_material_being_taught"),
            int("no_of_lay_school_teachers"),
            int("average_attendance_at_lay_school_meeting"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::SheepSeeking,
        slug: "sheep-seeking",
        display_name: "Sheep Seeking",
        campaign_table: "campaign_shs",
        submission_table: "submission_shs",
        file_table: Some("submission_shs_files"),
        fields: &[
            int("no_of_people_visited"),
            text("types_of_visits_done"),
            int("no_of_idl_visits_done"),
            int("no_of_first_time_retained"),
            int("no_of_convert_visits_done"),
            int("no_of_converts_retained"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::Testimony,
        slug: "testimony",
        display_name: "Testimony",
        campaign_table: "campaign_tes",
        submission_table: "submission_tes",
        file_table: None,
        fields: &[
            int("number_of_testimonies_shared"),
            text("type_of_testimony_shared"),
        ],
        preview_fields: &["number_of_testimonies_shared"],
    },
    CatalogEntry {
        kind: CampaignKind::Telepastoring,
        slug: "telepastoring",
        display_name: "Telepastoring",
        campaign_table: "campaign_tel",
        submission_table: "submission_tel",
        file_table: Some("submission_tel_files"),
        fields: &[
            int("no_of_telepastors"),
            int("total_no_of_calls_made"),
            text("categories_of_people_called"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::GatheringBus,
        slug: "gathering-bus",
        display_name: "Gathering Bus",
        campaign_table: "campaign_gbc",
        submission_table: "submission_gbc",
        file_table: Some("submission_gbc_files"),
        fields: &[
            int("avg_number_of_members_bused"),
            int("avg_number_of_members_who_walk_in"),
            int("avg_number_of_buses_for_service"),
            int("avg_attendance_for_the_service"),
            int("avg_number_of_first_timers"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::OrganisedCreativeArts,
        slug: "organised-creative-arts",
        display_name: "Organised Creative Arts",
        campaign_table: "campaign_oca",
        submission_table: "submission_oca",
        file_table: None,
        fields: &[
            boolean("was_there_any_organisation_of_creative_arts"),
            text("which_basonta_was_responsible"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::Tangerine,
        slug: "tangerine",
        display_name: "Tangerine",
        campaign_table: "campaign_tan",
        submission_table: "submission_tan",
        file_table: None,
        fields: &[int("no_of_tangerines"), text("types_of_tangerines")],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::SwollenSunday,
        slug: "swollen-sunday",
        display_name: "Swollen Sunday",
        campaign_table: "campaign_ss",
        submission_table: "submission_ss",
        file_table: Some("submission_ss_files"),
        fields: &[
            int("attendance_for_swollen_sunday"),
            int("no_of_converts_for_swollen_sunday"),
        ],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::SundayManagement,
        slug: "sunday-management",
        display_name: "Sunday Management",
        campaign_table: "campaign_sm",
        submission_table: "submission_sm",
        file_table: Some("submission_sm_files"),
        fields: &[date("month"), int("no_of_meetings_per_month")],
        preview_fields: &[],
    },
    CatalogEntry {
        kind: CampaignKind::Equipment,
        slug: "equipment",
        display_name: "Equipment",
        campaign_table: "campaign_equip",
        submission_table: "submission_equip",
        file_table: Some("submission_equip_files"),
        fields: &[
            text("equipment_name"),
            text("equipment_type"),
            int("quantity"),
            text("condition"),
            text("location"),
            date("purchase_date"),
            float("purchase_cost"),
            float("current_value"),
            text("supplier_name"),
            date("warranty_expiry_date"),
            text("maintenance_notes"),
            boolean("is_functional"),
        ],
        preview_fields: &[],
    },
];

impl CampaignKind {
    pub fn entry(self) -> &'static CatalogEntry {
        CATALOG
            .iter()
            .find(|e| e.kind == self)
            .expect("every kind has a catalog entry")
    }

    pub fn slug(self) -> &'static str {
        self.entry().slug
    }

    pub fn display_name(self) -> &'static str {
        self.entry().display_name
    }
}

pub fn entry_for_slug(slug: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.slug == slug)
}

/// Normalize a campaign id supplied by a client. Both a JSON number and a
/// numeric string must resolve to the same canonical i64: comparing the
/// raw representation against stored assignment rows produces false
/// negatives for campaign managers.
pub fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_covers_all_kinds_once() {
        assert_eq!(CATALOG.len(), 21);
        let slugs: HashSet<_> = CATALOG.iter().map(|e| e.slug).collect();
        assert_eq!(slugs.len(), 21);
        let tables: HashSet<_> = CATALOG.iter().map(|e| e.submission_table).collect();
        assert_eq!(tables.len(), 21);
        for entry in CATALOG {
            assert!(std::ptr::eq(entry.kind.entry(), entry));
        }
    }

    #[test]
    fn preview_fields_are_declared_fields() {
        for entry in CATALOG {
            for preview in entry.preview_fields {
                assert!(
                    entry.fields.iter().any(|f| f.name == *preview),
                    "{} previews unknown column {}",
                    entry.slug,
                    preview
                );
            }
        }
    }

    #[test]
    fn fourteen_kinds_accept_pictures() {
        let with_files = CATALOG.iter().filter(|e| e.file_table.is_some()).count();
        assert_eq!(with_files, 14);
    }

    #[test]
    fn slug_lookup_round_trips() {
        assert_eq!(
            entry_for_slug("soul-winning").unwrap().kind,
            CampaignKind::SoulWinning
        );
        assert!(entry_for_slug("soul_winning").is_none());
    }

    #[test]
    fn campaign_id_is_coerced_from_string_and_number() {
        assert_eq!(coerce_id(&serde_json::json!(7)), Some(7));
        assert_eq!(coerce_id(&serde_json::json!("7")), Some(7));
        assert_eq!(coerce_id(&serde_json::json!(" 7 ")), Some(7));
        assert_eq!(coerce_id(&serde_json::json!("seven")), None);
        assert_eq!(coerce_id(&serde_json::json!(null)), None);
        assert_eq!(coerce_id(&serde_json::json!(7.5)), None);
    }
}
