//! Diesel schema for task persistence.

diesel::table! {
    tasks (id) {
        id -> Int4,
        #[max_length = 100]
        service_name -> Varchar,
        #[max_length = 20]
        status -> Varchar,
        input_data -> Jsonb,
        output_data -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
