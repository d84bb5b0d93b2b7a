//! Suggested business types offered by the intake form

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BusinessCategory {
    pub category: &'static str,
    pub types: &'static [&'static str],
}

pub const BUSINESS_CATEGORIES: &[BusinessCategory] = &[
    BusinessCategory {
        category: "Healthcare & Medical",
        types: &[
            "Dentist",
            "Orthodontist",
            "Chiropractor",
            "Physical Therapist",
            "Optometrist",
            "Veterinarian",
            "Medical Clinic",
            "Mental Health Counselor",
            "Dermatologist",
            "Pediatrician",
        ],
    },
    BusinessCategory {
        category: "Legal Services",
        types: &[
            "Family Lawyer",
            "Criminal Defense Attorney",
            "Estate Planning Attorney",
            "Personal Injury Lawyer",
            "Business/Corporate Lawyer",
            "Immigration Attorney",
            "Bankruptcy Attorney",
            "Real Estate Attorney",
        ],
    },
    BusinessCategory {
        category: "Home Services",
        types: &[
            "Plumber",
            "Electrician",
            "HVAC Technician",
            "Roofing Contractor",
            "General Contractor",
            "Landscaper",
            "Pest Control",
            "House Cleaning Service",
            "Handyman",
            "Painter",
        ],
    },
    BusinessCategory {
        category: "Professional Services",
        types: &[
            "Accountant/CPA",
            "Financial Advisor",
            "Insurance Agent",
            "Real Estate Agent",
            "Mortgage Broker",
            "Business Consultant",
            "Marketing Agency",
            "Web Design Agency",
            "IT Services",
            "HR Consultant",
        ],
    },
    BusinessCategory {
        category: "Automotive",
        types: &[
            "Auto Repair Shop",
            "Auto Detailing",
            "Tire Shop",
            "Auto Body Shop",
            "Car Dealership",
            "Motorcycle Repair",
        ],
    },
    BusinessCategory {
        category: "Beauty & Wellness",
        types: &[
            "Hair Salon",
            "Nail Salon",
            "Spa/Massage Therapy",
            "Barber Shop",
            "Makeup Artist",
            "Esthetician",
            "Tattoo Studio",
        ],
    },
    BusinessCategory {
        category: "Fitness & Recreation",
        types: &[
            "Gym/Fitness Center",
            "Personal Trainer",
            "Yoga Studio",
            "Martial Arts School",
            "Dance Studio",
            "Sports Coach/Training",
        ],
    },
    BusinessCategory {
        category: "Education & Childcare",
        types: &[
            "Tutoring Service",
            "Daycare Center",
            "Preschool",
            "Music Teacher",
            "Art Classes",
            "Driving School",
        ],
    },
    BusinessCategory {
        category: "Food & Hospitality",
        types: &[
            "Restaurant",
            "Catering Service",
            "Bakery",
            "Food Truck",
            "Coffee Shop",
            "Bar/Nightclub",
        ],
    },
    BusinessCategory {
        category: "Retail & E-commerce",
        types: &[
            "Clothing Store",
            "Jewelry Store",
            "Pet Store",
            "Furniture Store",
            "Electronics Store",
            "Online Retailer",
        ],
    },
    BusinessCategory {
        category: "Other Services",
        types: &[
            "Photography/Videography",
            "Event Planning",
            "Travel Agency",
            "Funeral Home",
            "Moving Company",
            "Storage Facility",
        ],
    },
];

/// Category containing `business_type`, if it is one of the suggestions
pub fn category_of(business_type: &str) -> Option<&'static str> {
    BUSINESS_CATEGORIES
        .iter()
        .find(|c| c.types.iter().any(|t| t.eq_ignore_ascii_case(business_type)))
        .map(|c| c.category)
}
