mod at;
