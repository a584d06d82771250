//! Sample records: one employee per persona.

use chrono::Utc;

use crate::employee::Employee;
use crate::id::EmployeeId;

struct Persona {
    first_name: &'static str,
    last_name: &'static str,
}

const DEVELOPER: Persona = Persona {
    first_name: "Aaron",
    last_name: "Andersen",
};

const DEVOPS: Persona = Persona {
    first_name: "John",
    last_name: "Wakefield",
};

const OPERATIONAL: Persona = Persona {
    first_name: "Michael",
    last_name: "Johnson",
};

const CEO: Persona = Persona {
    first_name: "Brad",
    last_name: "Smith",
};

/// Surnames of the sample personas, in factory order.
pub const SAMPLE_SURNAMES: [&str; 4] = [
    DEVELOPER.last_name,
    DEVOPS.last_name,
    OPERATIONAL.last_name,
    CEO.last_name,
];

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn build(persona: &Persona, millis: i64) -> Employee {
    Employee::from_parts(
        EmployeeId::generate(persona.last_name, millis),
        persona.first_name.to_string(),
        persona.last_name.to_string(),
    )
}

pub fn developer() -> Employee {
    developer_at(now_millis())
}

pub fn developer_at(millis: i64) -> Employee {
    build(&DEVELOPER, millis)
}

pub fn devops() -> Employee {
    devops_at(now_millis())
}

pub fn devops_at(millis: i64) -> Employee {
    build(&DEVOPS, millis)
}

pub fn operational() -> Employee {
    operational_at(now_millis())
}

pub fn operational_at(millis: i64) -> Employee {
    build(&OPERATIONAL, millis)
}

pub fn ceo() -> Employee {
    ceo_at(now_millis())
}

pub fn ceo_at(millis: i64) -> Employee {
    build(&CEO, millis)
}

/// All four sample employees: developer, devops, operational, CEO.
pub fn sample_employees() -> Vec<Employee> {
    vec![developer(), devops(), operational(), ceo()]
}
